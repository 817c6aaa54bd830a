use std::collections::{BTreeMap, BTreeSet};

use crate::calendar::Calendar;
use crate::diagnostics::ScheduleObserver;
use crate::error::Result;
use crate::hierarchy::TaskHierarchy;
use crate::task::{Task, TaskId};
use crate::time_unit::TimeDuration;

/// Propagates children's spans up through their containers.
pub struct AdjustBounds<'a> {
    hierarchy: &'a TaskHierarchy,
    calendar: &'a dyn Calendar,
    observer: &'a dyn ScheduleObserver,
}

impl<'a> AdjustBounds<'a> {
    pub fn new(
        hierarchy: &'a TaskHierarchy,
        calendar: &'a dyn Calendar,
        observer: &'a dyn ScheduleObserver,
    ) -> Self {
        Self {
            hierarchy,
            calendar,
            observer,
        }
    }

    /// Fits every task in `supertasks` around its children, then walks up
    /// through the containers until a round changes nothing.
    pub fn run(
        &self,
        tasks: &mut BTreeMap<TaskId, Task>,
        supertasks: &[TaskId],
    ) -> Result<BTreeSet<TaskId>> {
        let mut modified_total = BTreeSet::new();
        let mut pending: BTreeSet<TaskId> = supertasks.iter().copied().collect();
        let mut modified = pending.clone();

        while !pending.is_empty() {
            for supertask in &pending {
                if self.fit_to_children(tasks, *supertask)? {
                    modified.insert(*supertask);
                    modified_total.insert(*supertask);
                }
            }
            pending = modified
                .iter()
                .filter_map(|task| self.hierarchy.container_of(*task))
                .filter(|container| tasks.contains_key(container))
                .collect();
            modified.clear();
        }
        Ok(modified_total)
    }

    /// Moves children that stick out of `supertask` back inside, keeping
    /// their durations, and refits the containers above them.
    /// Returns the moved children so the caller can reschedule from them.
    pub fn adjust_nested_tasks(
        &self,
        tasks: &mut BTreeMap<TaskId, Task>,
        supertask: TaskId,
    ) -> Result<Vec<TaskId>> {
        let Some(parent) = tasks.get(&supertask) else {
            return Ok(Vec::new());
        };
        let (start, end) = (parent.start(), parent.end());

        let mut nested: Vec<TaskId> = self.hierarchy.nested_tasks(supertask).to_vec();
        nested.sort_by_key(|id| tasks.get(id).map(Task::start));

        let mut moved = Vec::new();
        for child_id in nested {
            let Some(child) = tasks.get_mut(&child_id) else {
                continue;
            };
            let mut changed = false;
            if child.start() < start {
                child.shift_to(start, self.calendar)?;
                changed = true;
            }
            if child.end() > end {
                let overshoot = self.calendar.working_days_between(end, child.end());
                child.shift_by(TimeDuration::days(-overshoot), self.calendar)?;
                changed = true;
            }
            if changed {
                self.observer
                    .task_rescheduled(child_id, child.start(), child.end());
                moved.push(child_id);
            }
        }
        if !moved.is_empty() {
            tracing::debug!(supertask, moved = moved.len(), "nested tasks pulled inside supertask");
            self.run(tasks, &moved)?;
        }
        Ok(moved)
    }

    fn fit_to_children(&self, tasks: &mut BTreeMap<TaskId, Task>, supertask: TaskId) -> Result<bool> {
        let children = self.hierarchy.nested_tasks(supertask);
        let min_start = children.iter().filter_map(|id| tasks.get(id)).map(Task::start).min();
        let max_end = children.iter().filter_map(|id| tasks.get(id)).map(Task::end).max();
        let (Some(min_start), Some(max_end)) = (min_start, max_end) else {
            return Ok(false);
        };
        let Some(task) = tasks.get_mut(&supertask) else {
            return Ok(false);
        };

        let mut changed = false;
        if task.start() != min_start {
            task.set_start_keep_end(min_start, self.calendar)?;
            changed = true;
        }
        if task.end() != max_end {
            task.set_end(max_end, self.calendar)?;
            changed = true;
        }
        if changed {
            self.observer
                .task_rescheduled(supertask, task.start(), task.end());
        }
        Ok(changed)
    }
}
