use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

use crate::task::TaskId;

pub type Result<T> = std::result::Result<T, ScheduleError>;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("dependency of task {dependant} on task {dependee} would create a cycle")]
    Cycle { dependant: TaskId, dependee: TaskId },

    #[error("moving task {task} under {parent} would create a cycle")]
    MoveCycle { task: TaskId, parent: TaskId },

    #[error("task {dependant} already depends on task {dependee}")]
    DuplicateDependency { dependant: TaskId, dependee: TaskId },

    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    #[error("unknown task id {0}")]
    InvalidReference(TaskId),

    #[error("calendar produced no usable activities for {start}..{end}")]
    CalendarGap { start: NaiveDate, end: NaiveDate },

    #[error("no free task id left after {0}")]
    IdSpaceExhausted(TaskId),

    #[error("completion must be within 0..=100, got {0}")]
    InvalidCompletion(u8),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] PolarsError),
}

impl ScheduleError {
    /// Structural errors are recovered at the call boundary; the rest are defects.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ScheduleError::Cycle { .. }
                | ScheduleError::MoveCycle { .. }
                | ScheduleError::DuplicateDependency { .. }
                | ScheduleError::SelfDependency(_)
        )
    }
}
