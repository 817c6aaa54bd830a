use std::collections::BTreeMap;

use crate::calendar::Calendar;
use crate::error::Result;
use crate::hierarchy::TaskHierarchy;
use crate::task::{Task, TaskId};

/// Rolls children's completion up into their container.
pub struct CompletionAggregator<'a> {
    hierarchy: &'a TaskHierarchy,
    calendar: &'a dyn Calendar,
}

impl<'a> CompletionAggregator<'a> {
    pub fn new(hierarchy: &'a TaskHierarchy, calendar: &'a dyn Calendar) -> Self {
        Self {
            hierarchy,
            calendar,
        }
    }

    /// Weighted mean of direct children; returns whether `container` changed.
    pub fn run(&self, tasks: &mut BTreeMap<TaskId, Task>, container: TaskId) -> Result<bool> {
        let mut weighted = 0i64;
        let mut total = 0i64;
        for child in self.hierarchy.nested_tasks(container) {
            let Some(task) = tasks.get(child) else {
                continue;
            };
            let weight = if task.is_milestone() {
                1
            } else {
                task.duration_in_days(self.calendar).max(0)
            };
            weighted += weight * i64::from(task.completion());
            total += weight;
        }
        if total == 0 {
            return Ok(false);
        }
        let completion = (weighted as f64 / total as f64).round() as u8;

        let Some(task) = tasks.get_mut(&container) else {
            return Ok(false);
        };
        if task.completion() == completion {
            return Ok(false);
        }
        task.set_completion(completion)?;
        Ok(true)
    }

    /// Every container, deepest first, so nested progress reaches the top.
    pub fn run_all(&self, tasks: &mut BTreeMap<TaskId, Task>) -> Result<usize> {
        let mut updated = 0;
        for container in self.hierarchy.document_order().into_iter().rev() {
            if self.hierarchy.has_nested_tasks(container) && self.run(tasks, container)? {
                updated += 1;
            }
        }
        Ok(updated)
    }
}
