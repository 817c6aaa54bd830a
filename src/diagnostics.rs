use chrono::NaiveDate;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::task::TaskId;

/// Receives every schedule change made by a recalculation pass.
pub trait ScheduleObserver: fmt::Debug + Send + Sync {
    fn task_rescheduled(&self, task: TaskId, start: NaiveDate, end: NaiveDate);

    fn internal_error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScheduleObserver for NoopObserver {
    fn task_rescheduled(&self, _task: TaskId, _start: NaiveDate, _end: NaiveDate) {}

    fn internal_error(&self, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleEvent {
    Rescheduled {
        task: TaskId,
        start: NaiveDate,
        end: NaiveDate,
    },
    InternalError(String),
}

/// Observer that appends every notification to a shared log.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<ScheduleEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScheduleEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<ScheduleEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn rescheduled_tasks(&self) -> Vec<TaskId> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ScheduleEvent::Rescheduled { task, .. } => Some(*task),
                ScheduleEvent::InternalError(_) => None,
            })
            .collect()
    }
}

impl ScheduleObserver for RecordingObserver {
    fn task_rescheduled(&self, task: TaskId, start: NaiveDate, end: NaiveDate) {
        self.events
            .lock()
            .push(ScheduleEvent::Rescheduled { task, start, end });
    }

    fn internal_error(&self, message: &str) {
        self.events
            .lock()
            .push(ScheduleEvent::InternalError(message.to_owned()));
    }
}
