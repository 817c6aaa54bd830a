use chrono::NaiveDate;
use polars::prelude::PlSmallStr;
use polars::prelude::*;
use std::collections::BTreeMap;

use crate::dependency::TaskDependency;
use crate::error::Result;
use crate::task::{Task, TaskId};

/// Point-in-time copy of a schedule, detached from the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSnapshot {
    /// Tasks in document order.
    pub tasks: Vec<Task>,
    /// Containers of nested tasks; top-level tasks are absent.
    pub parents: BTreeMap<TaskId, TaskId>,
    pub dependencies: Vec<TaskDependency>,
    pub project_start: Option<NaiveDate>,
    pub project_end: Option<NaiveDate>,
}

impl ScheduleSnapshot {
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// One row per task, in document order.
    pub fn tasks_frame(&self) -> Result<DataFrame> {
        let ids: Vec<i32> = self.tasks.iter().map(|task| task.id).collect();
        let names: Vec<&str> = self.tasks.iter().map(|task| task.name.as_str()).collect();
        let parents: Vec<Option<i32>> = self
            .tasks
            .iter()
            .map(|task| self.parents.get(&task.id).copied())
            .collect();
        let starts: Vec<i32> = self.tasks.iter().map(|task| date_to_i32(task.start())).collect();
        let ends: Vec<i32> = self.tasks.iter().map(|task| date_to_i32(task.end())).collect();
        let durations: Vec<Option<i64>> = self
            .tasks
            .iter()
            .map(|task| task.duration().as_days())
            .collect();
        let milestones: Vec<bool> = self.tasks.iter().map(Task::is_milestone).collect();
        let completion: Vec<i32> = self
            .tasks
            .iter()
            .map(|task| i32::from(task.completion()))
            .collect();
        let critical: Vec<bool> = self.tasks.iter().map(Task::is_critical).collect();

        let columns: Vec<Column> = vec![
            Series::new(PlSmallStr::from_static("id"), ids).into_column(),
            Series::new(PlSmallStr::from_static("name"), names).into_column(),
            Series::new(PlSmallStr::from_static("parent_id"), parents).into_column(),
            Series::new(PlSmallStr::from_static("start"), starts)
                .cast(&DataType::Date)?
                .into_column(),
            Series::new(PlSmallStr::from_static("end"), ends)
                .cast(&DataType::Date)?
                .into_column(),
            Series::new(PlSmallStr::from_static("duration_days"), durations).into_column(),
            Series::new(PlSmallStr::from_static("milestone"), milestones).into_column(),
            Series::new(PlSmallStr::from_static("completion"), completion).into_column(),
            Series::new(PlSmallStr::from_static("is_critical"), critical).into_column(),
        ];
        Ok(DataFrame::new(columns)?)
    }

    pub fn dependencies_frame(&self) -> Result<DataFrame> {
        let dependants: Vec<i32> = self.dependencies.iter().map(|dep| dep.dependant).collect();
        let dependees: Vec<i32> = self.dependencies.iter().map(|dep| dep.dependee).collect();
        let constraints: Vec<String> = self
            .dependencies
            .iter()
            .map(|dep| format!("{:?}", dep.constraint))
            .collect();
        let lags: Vec<i64> = self.dependencies.iter().map(|dep| dep.lag).collect();
        let hardness: Vec<String> = self
            .dependencies
            .iter()
            .map(|dep| format!("{:?}", dep.hardness))
            .collect();

        let columns: Vec<Column> = vec![
            Series::new(PlSmallStr::from_static("dependant"), dependants).into_column(),
            Series::new(PlSmallStr::from_static("dependee"), dependees).into_column(),
            Series::new(PlSmallStr::from_static("constraint"), constraints).into_column(),
            Series::new(PlSmallStr::from_static("lag"), lags).into_column(),
            Series::new(PlSmallStr::from_static("hardness"), hardness).into_column(),
        ];
        Ok(DataFrame::new(columns)?)
    }
}

fn date_to_i32(date: NaiveDate) -> i32 {
    (date - chrono::DateTime::UNIX_EPOCH.date_naive()).num_days() as i32
}
