use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::calendar::{Calendar, SearchDirection};
use crate::dependency::{DependencyCollection, Hardness};
use crate::diagnostics::ScheduleObserver;
use crate::error::Result;
use crate::graph::{DependencyGraph, EdgeKind};
use crate::task::{Task, TaskId};

/// Closed date interval; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub lower: Option<NaiveDate>,
    pub upper: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn at_least(lower: NaiveDate) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
        }
    }

    pub fn at_most(upper: NaiveDate) -> Self {
        Self {
            lower: None,
            upper: Some(upper),
        }
    }

    pub fn closed(lower: NaiveDate, upper: NaiveDate) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    pub fn is_all(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// `None` when the ranges do not overlap.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let lower = match (self.lower, other.lower) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let upper = match (self.upper, other.upper) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        match (lower, upper) {
            (Some(l), Some(u)) if l > u => None,
            _ => Some(DateRange { lower, upper }),
        }
    }

    /// Smallest range enclosing both.
    pub fn span(&self, other: &DateRange) -> DateRange {
        let lower = match (self.lower, other.lower) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        let upper = match (self.upper, other.upper) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        DateRange { lower, upper }
    }
}

/// Forward propagation of dependency bounds, layer by layer through the graph.
pub struct Scheduler<'a> {
    graph: &'a DependencyGraph,
    dependencies: &'a DependencyCollection,
    calendar: &'a dyn Calendar,
    observer: &'a dyn ScheduleObserver,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        dependencies: &'a DependencyCollection,
        calendar: &'a dyn Calendar,
        observer: &'a dyn ScheduleObserver,
    ) -> Self {
        Self {
            graph,
            dependencies,
            calendar,
            observer,
        }
    }

    /// Reschedules every task. Returns the IDs whose dates changed.
    pub fn run(&self, tasks: &mut BTreeMap<TaskId, Task>) -> Result<BTreeSet<TaskId>> {
        self.run_scoped(tasks, None)
    }

    /// Reschedules `changed` and everything reachable from them in the graph.
    pub fn run_from(
        &self,
        tasks: &mut BTreeMap<TaskId, Task>,
        changed: &[TaskId],
    ) -> Result<BTreeSet<TaskId>> {
        let mut scope = HashSet::new();
        let mut stack: Vec<TaskId> = changed.to_vec();
        while let Some(current) = stack.pop() {
            if scope.insert(current) {
                stack.extend(self.graph.outgoing(current).iter().map(|edge| edge.dst));
            }
        }
        self.run_scoped(tasks, Some(&scope))
    }

    fn run_scoped(
        &self,
        tasks: &mut BTreeMap<TaskId, Task>,
        scope: Option<&HashSet<TaskId>>,
    ) -> Result<BTreeSet<TaskId>> {
        let mut modified = BTreeSet::new();
        for layer in self.graph.layers() {
            for task_id in layer {
                if scope.is_some_and(|scope| !scope.contains(&task_id)) {
                    continue;
                }
                if self.schedule(tasks, task_id)? {
                    modified.insert(task_id);
                }
            }
        }
        tracing::debug!(modified = modified.len(), "schedule pass finished");
        Ok(modified)
    }

    fn schedule(&self, tasks: &mut BTreeMap<TaskId, Task>, task_id: TaskId) -> Result<bool> {
        let Some(task) = tasks.get(&task_id) else {
            return Ok(false);
        };

        let mut start_range = DateRange::all();
        let mut weak_start_range = DateRange::all();
        let mut subtask_span: Option<DateRange> = None;

        for edge in self.graph.incoming(task_id) {
            let (dependant_id, weak_kind) = match edge.kind {
                EdgeKind::SubSuper => {
                    if let Some(subtask) = tasks.get(&edge.src) {
                        let span = DateRange::closed(subtask.start(), subtask.end());
                        subtask_span = Some(match subtask_span {
                            Some(existing) => existing.span(&span),
                            None => span,
                        });
                    }
                    continue;
                }
                EdgeKind::Explicit => (task_id, false),
                EdgeKind::Inherited { supertask } => (supertask, true),
            };

            let Some(dependency) = self.dependencies.get(dependant_id, edge.src) else {
                self.report(&format!(
                    "graph edge {} -> {} has no dependency record",
                    edge.src, dependant_id
                ));
                continue;
            };
            let (Some(dependee), Some(dependant)) = (tasks.get(&edge.src), tasks.get(&dependant_id))
            else {
                continue;
            };

            let collision = dependency.collision(dependee, dependant, self.calendar);
            let weak = weak_kind || (!collision.violated && dependency.hardness == Hardness::Rubber);
            let bound = DateRange::at_least(collision.acceptable_start);
            let target = if weak {
                &mut weak_start_range
            } else {
                &mut start_range
            };
            match target.intersect(&bound) {
                Some(range) => *target = range,
                None => {
                    self.report(&format!("conflicting bounds on task {task_id}"));
                    return Ok(false);
                }
            }
        }

        let own_span = subtask_span.unwrap_or(DateRange::closed(task.start(), task.end()));
        let subtree_start_upwards = own_span.span(&DateRange::at_least(task.start()));

        let mut narrowed = if !start_range.is_all() {
            start_range.intersect(&weak_start_range)
        } else if !weak_start_range.is_all() {
            weak_start_range.intersect(&subtree_start_upwards)
        } else {
            Some(start_range)
        };
        if let Some(earliest) = task.earliest_start() {
            narrowed = narrowed.and_then(|range| range.intersect(&DateRange::at_least(earliest)));
        }
        let mut end_range = DateRange::all();
        if let Some(span) = subtask_span {
            narrowed = narrowed.and_then(|range| range.intersect(&span));
            end_range = span;
        }
        let Some(start_range) = narrowed else {
            self.report(&format!("task {task_id} has no feasible start"));
            return Ok(false);
        };

        let has_subtasks = subtask_span.is_some();
        let start = task.start();
        let end = task.end();
        let mut changed = false;

        let Some(task) = tasks.get_mut(&task_id) else {
            return Ok(false);
        };
        if let Some(new_start) = start_range.lower {
            if new_start != start {
                if has_subtasks {
                    task.set_start_keep_end(new_start, self.calendar)?;
                } else {
                    task.shift_to(new_start, self.calendar)?;
                }
                changed = true;
            }
        }
        if let Some(upper) = end_range.upper {
            let new_end = self.trim_non_working_tail(upper, task.start());
            if new_end != task.end() {
                task.set_end(new_end, self.calendar)?;
                changed = changed || task.end() != end;
            }
        }

        if changed {
            tracing::debug!(task = task_id, start = %task.start(), end = %task.end(), "task rescheduled");
            self.observer
                .task_rescheduled(task_id, task.start(), task.end());
        }
        Ok(changed)
    }

    /// Pulls a supertask end back over trailing non-working days.
    fn trim_non_working_tail(&self, end: NaiveDate, start: NaiveDate) -> NaiveDate {
        if !self.calendar.is_working(end) {
            return end;
        }
        let previous = end - Duration::days(1);
        if self.calendar.is_working(previous) {
            return end;
        }
        match self
            .calendar
            .find_closest(previous, SearchDirection::Backward, true)
        {
            Some(last_working) if last_working + Duration::days(1) > start => {
                last_working + Duration::days(1)
            }
            _ => end,
        }
    }

    fn report(&self, message: &str) {
        tracing::warn!("{message}");
        self.observer.internal_error(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn range_intersection_and_span() {
        let a = DateRange::at_least(d(2024, 1, 3));
        let b = DateRange::closed(d(2024, 1, 1), d(2024, 1, 5));
        assert_eq!(a.intersect(&b), Some(DateRange::closed(d(2024, 1, 3), d(2024, 1, 5))));
        assert_eq!(DateRange::at_least(d(2024, 1, 9)).intersect(&b), None);
        assert_eq!(
            b.span(&DateRange::at_least(d(2024, 1, 2))),
            DateRange::at_least(d(2024, 1, 1))
        );
        assert!(DateRange::all().is_all());
    }
}
