use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::calendar::Calendar;
use crate::error::{Result, ScheduleError};
use crate::hierarchy::TaskHierarchy;
use crate::task::{Task, TaskActivity, TaskId};
use crate::time_unit::TimeDuration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConstraintType {
    #[default]
    FinishStart,
    StartStart,
    FinishFinish,
    StartFinish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hardness {
    #[default]
    Strong,
    Rubber,
}

/// Side of a task a constraint reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Start,
    End,
}

impl ConstraintType {
    /// `(anchor on dependee, bounded side of dependant)`.
    pub fn sides(self) -> (Side, Side) {
        match self {
            ConstraintType::FinishStart => (Side::End, Side::Start),
            ConstraintType::StartStart => (Side::Start, Side::Start),
            ConstraintType::FinishFinish => (Side::End, Side::End),
            ConstraintType::StartFinish => (Side::Start, Side::End),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variation {
    StartEarlier,
    StartLater,
    NoVariation,
}

/// Result of checking a dependency against the current schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub violated: bool,
    pub acceptable_start: NaiveDate,
    pub variation: Variation,
}

/// Activity segments a dependency is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityBinding {
    pub dependee_activity: TaskActivity,
    pub dependant_activity: TaskActivity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub dependant: TaskId,
    pub dependee: TaskId,
    pub constraint: ConstraintType,
    /// Signed lag in working days.
    pub lag: i64,
    pub hardness: Hardness,
}

impl TaskDependency {
    pub fn new(dependant: TaskId, dependee: TaskId) -> Self {
        Self {
            dependant,
            dependee,
            constraint: ConstraintType::FinishStart,
            lag: 0,
            hardness: Hardness::Strong,
        }
    }

    pub fn with_constraint(mut self, constraint: ConstraintType) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn with_lag(mut self, lag: i64) -> Self {
        self.lag = lag;
        self
    }

    pub fn with_hardness(mut self, hardness: Hardness) -> Self {
        self.hardness = hardness;
        self
    }

    pub fn key(&self) -> (TaskId, TaskId) {
        (self.dependant, self.dependee)
    }

    pub fn activity_binding(&self, dependee: &Task, dependant: &Task) -> Option<ActivityBinding> {
        let (anchor, bounded) = self.constraint.sides();
        let dependee_activity = match anchor {
            Side::Start => dependee.first_working_activity(),
            Side::End => dependee.last_working_activity(),
        }?;
        let dependant_activity = match bounded {
            Side::Start => dependant.first_working_activity(),
            Side::End => dependant.last_working_activity(),
        }?;
        Some(ActivityBinding {
            dependee_activity: *dependee_activity,
            dependant_activity: *dependant_activity,
        })
    }

    /// Acceptable start of the dependant and how far off the current start is.
    pub fn collision(&self, dependee: &Task, dependant: &Task, calendar: &dyn Calendar) -> Collision {
        let (anchor, bounded) = self.constraint.sides();
        let binding = self.activity_binding(dependee, dependant);

        let anchor_date = match (anchor, binding) {
            (Side::Start, Some(b)) => b.dependee_activity.start,
            (Side::End, Some(b)) => b.dependee_activity.end,
            (Side::Start, None) => dependee.start(),
            (Side::End, None) => dependee.end(),
        };
        let bound = calendar.shift_date(anchor_date, TimeDuration::days(self.lag));
        let acceptable_start = match bounded {
            Side::Start => bound,
            Side::End => calendar.shift_date(
                bound,
                TimeDuration::days(-dependant.duration_in_days(calendar)),
            ),
        };
        let acceptable_start = calendar.find_closest_working_time(acceptable_start);
        let current_start = calendar.find_closest_working_time(dependant.start());

        let (violated, variation) = match current_start.cmp(&acceptable_start) {
            Ordering::Less => (true, Variation::StartLater),
            Ordering::Greater if self.hardness == Hardness::Strong => {
                (true, Variation::StartEarlier)
            }
            _ => (false, Variation::NoVariation),
        };
        Collision {
            violated,
            acceptable_start,
            variation,
        }
    }

    /// Latest finish of the dependee that still lets the dependant start at
    /// `dependant_latest_start`.
    pub fn backward_collision(
        &self,
        dependee: &Task,
        dependant: &Task,
        dependant_latest_start: NaiveDate,
        calendar: &dyn Calendar,
    ) -> NaiveDate {
        let (anchor, bounded) = self.constraint.sides();
        let limit = match bounded {
            Side::Start => dependant_latest_start,
            Side::End => calendar.shift_date(
                dependant_latest_start,
                TimeDuration::days(dependant.duration_in_days(calendar)),
            ),
        };
        let anchor_limit = calendar.shift_date(limit, TimeDuration::days(-self.lag));
        match anchor {
            Side::End => anchor_limit,
            Side::Start => calendar.shift_date(
                anchor_limit,
                TimeDuration::days(dependee.duration_in_days(calendar)),
            ),
        }
    }
}

/// Dependencies keyed by `(dependant, dependee)` with a reverse index.
#[derive(Debug, Clone, Default)]
pub struct DependencyCollection {
    by_pair: BTreeMap<(TaskId, TaskId), TaskDependency>,
    dependants: HashMap<TaskId, BTreeSet<TaskId>>,
}

impl DependencyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_pair.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pair.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskDependency> {
        self.by_pair.values()
    }

    pub fn get(&self, dependant: TaskId, dependee: TaskId) -> Option<&TaskDependency> {
        self.by_pair.get(&(dependant, dependee))
    }

    pub fn contains(&self, dependant: TaskId, dependee: TaskId) -> bool {
        self.by_pair.contains_key(&(dependant, dependee))
    }

    /// Dependencies in which `task` is the dependant.
    pub fn as_dependant(&self, task: TaskId) -> impl Iterator<Item = &TaskDependency> {
        self.by_pair
            .range((task, TaskId::MIN)..=(task, TaskId::MAX))
            .map(|(_, dependency)| dependency)
    }

    /// Dependencies in which `task` is the dependee.
    pub fn as_dependee(&self, task: TaskId) -> Vec<&TaskDependency> {
        self.dependants
            .get(&task)
            .into_iter()
            .flatten()
            .filter_map(|dependant| self.by_pair.get(&(*dependant, task)))
            .collect()
    }

    /// Structural checks that do not need the graph: self reference,
    /// hierarchy relation and duplicates. A link between a task and one of
    /// its ancestors loops through the containment edges, so it is a cycle.
    pub fn validate_new(
        &self,
        dependant: TaskId,
        dependee: TaskId,
        hierarchy: &TaskHierarchy,
    ) -> Result<()> {
        for id in [dependant, dependee] {
            if !hierarchy.contains(id) || id == hierarchy.root() {
                return Err(ScheduleError::InvalidReference(id));
            }
        }
        if dependant == dependee {
            return Err(ScheduleError::SelfDependency(dependant));
        }
        if !hierarchy.are_unrelated(dependant, dependee) {
            return Err(ScheduleError::Cycle {
                dependant,
                dependee,
            });
        }
        if self.contains(dependant, dependee) {
            return Err(ScheduleError::DuplicateDependency {
                dependant,
                dependee,
            });
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, dependency: TaskDependency) -> Result<()> {
        let key = dependency.key();
        if self.by_pair.contains_key(&key) {
            return Err(ScheduleError::DuplicateDependency {
                dependant: key.0,
                dependee: key.1,
            });
        }
        self.dependants.entry(key.1).or_default().insert(key.0);
        self.by_pair.insert(key, dependency);
        Ok(())
    }

    pub(crate) fn remove(&mut self, dependant: TaskId, dependee: TaskId) -> Option<TaskDependency> {
        let removed = self.by_pair.remove(&(dependant, dependee))?;
        if let Some(set) = self.dependants.get_mut(&dependee) {
            set.remove(&dependant);
            if set.is_empty() {
                self.dependants.remove(&dependee);
            }
        }
        Some(removed)
    }

    pub(crate) fn update(&mut self, dependency: TaskDependency) -> Option<TaskDependency> {
        let slot = self.by_pair.get_mut(&dependency.key())?;
        Some(std::mem::replace(slot, dependency))
    }

    /// Every dependency referencing `task` on either end.
    pub fn touching(&self, task: TaskId) -> Vec<TaskDependency> {
        let mut result: Vec<TaskDependency> = self.as_dependant(task).cloned().collect();
        result.extend(self.as_dependee(task).into_iter().cloned());
        result
    }
}
