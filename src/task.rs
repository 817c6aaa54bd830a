use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::error::{Result, ScheduleError};
use crate::time_unit::TimeDuration;

pub type TaskId = i32;

/// A slice of a task's span with uniform working status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskActivity {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub working: bool,
}

impl TaskActivity {
    /// Zero-length marker used by milestones.
    pub fn is_marker(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAssignment {
    pub resource_id: i32,
    /// Percent of the resource's working time.
    pub load: f32,
    #[serde(default)]
    pub coordinator: bool,
}

impl ResourceAssignment {
    pub fn new(resource_id: i32, load: f32) -> Self {
        Self {
            resource_id,
            load,
            coordinator: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub notes: Option<String>,
    start: NaiveDate,
    end: NaiveDate,
    duration: TimeDuration,
    milestone: bool,
    completion: u8,
    earliest_start: Option<NaiveDate>,
    critical: bool,
    activities: Vec<TaskActivity>,
    assignments: Vec<ResourceAssignment>,
}

impl Task {
    pub fn new(
        id: TaskId,
        name: impl Into<String>,
        start: NaiveDate,
        duration: TimeDuration,
        calendar: &dyn Calendar,
    ) -> Result<Self> {
        let mut task = Self {
            id,
            name: name.into(),
            notes: None,
            start,
            end: start,
            duration,
            milestone: false,
            completion: 0,
            earliest_start: None,
            critical: false,
            activities: Vec::new(),
            assignments: Vec::new(),
        };
        task.end = calendar.shift_date(start, duration).max(start);
        task.recompute_activities(calendar)?;
        Ok(task)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive end date.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn duration(&self) -> TimeDuration {
        self.duration
    }

    pub fn is_milestone(&self) -> bool {
        self.milestone
    }

    pub fn completion(&self) -> u8 {
        self.completion
    }

    pub fn earliest_start(&self) -> Option<NaiveDate> {
        self.earliest_start
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn activities(&self) -> &[TaskActivity] {
        &self.activities
    }

    pub fn assignments(&self) -> &[ResourceAssignment] {
        &self.assignments
    }

    /// Duration in working days, used as the aggregation weight.
    pub fn duration_in_days(&self, calendar: &dyn Calendar) -> i64 {
        if self.milestone {
            return 0;
        }
        self.duration
            .as_days()
            .unwrap_or_else(|| calendar.working_days_between(self.start, self.end))
    }

    pub fn first_working_activity(&self) -> Option<&TaskActivity> {
        self.activities
            .iter()
            .find(|activity| activity.working)
            .or_else(|| self.activities.first())
    }

    pub fn last_working_activity(&self) -> Option<&TaskActivity> {
        self.activities
            .iter()
            .rev()
            .find(|activity| activity.working)
            .or_else(|| self.activities.last())
    }

    /// Moves the task so it starts at `start`, keeping its duration.
    pub(crate) fn shift_to(&mut self, start: NaiveDate, calendar: &dyn Calendar) -> Result<()> {
        self.start = start;
        self.end = calendar.shift_date(start, self.duration).max(start);
        self.recompute_activities(calendar)
    }

    pub(crate) fn shift_by(&mut self, offset: TimeDuration, calendar: &dyn Calendar) -> Result<()> {
        let start = calendar.shift_date(self.start, offset);
        self.shift_to(start, calendar)
    }

    /// Sets the start and keeps the end, recomputing the duration.
    pub(crate) fn set_start_keep_end(
        &mut self,
        start: NaiveDate,
        calendar: &dyn Calendar,
    ) -> Result<()> {
        self.start = start;
        if self.end < start {
            self.end = start;
        }
        self.duration = TimeDuration::days(calendar.working_days_between(self.start, self.end));
        self.recompute_activities(calendar)
    }

    pub(crate) fn set_end(&mut self, end: NaiveDate, calendar: &dyn Calendar) -> Result<()> {
        if self.milestone {
            return Ok(());
        }
        self.end = end.max(self.start);
        self.duration = TimeDuration::days(calendar.working_days_between(self.start, self.end));
        self.recompute_activities(calendar)
    }

    pub(crate) fn set_duration(
        &mut self,
        duration: TimeDuration,
        calendar: &dyn Calendar,
    ) -> Result<()> {
        if self.milestone {
            return Ok(());
        }
        self.duration = duration;
        self.end = calendar.shift_date(self.start, duration).max(self.start);
        self.recompute_activities(calendar)
    }

    pub(crate) fn set_milestone(&mut self, milestone: bool, calendar: &dyn Calendar) -> Result<()> {
        if self.milestone == milestone {
            return Ok(());
        }
        self.milestone = milestone;
        if milestone {
            self.duration = TimeDuration::ZERO;
            self.end = self.start;
            self.recompute_activities(calendar)
        } else {
            self.set_duration(TimeDuration::days(1), calendar)
        }
    }

    pub(crate) fn set_completion(&mut self, completion: u8) -> Result<()> {
        if completion > 100 {
            return Err(ScheduleError::InvalidCompletion(completion));
        }
        self.completion = completion;
        Ok(())
    }

    pub(crate) fn set_earliest_start(&mut self, date: Option<NaiveDate>) {
        self.earliest_start = date;
    }

    pub(crate) fn set_critical(&mut self, critical: bool) {
        self.critical = critical;
    }

    pub(crate) fn add_assignment(&mut self, assignment: ResourceAssignment) {
        self.assignments
            .retain(|existing| existing.resource_id != assignment.resource_id);
        self.assignments.push(assignment);
    }

    pub(crate) fn remove_assignment(&mut self, resource_id: i32) -> bool {
        let before = self.assignments.len();
        self.assignments
            .retain(|existing| existing.resource_id != resource_id);
        before != self.assignments.len()
    }

    pub(crate) fn recompute_activities(&mut self, calendar: &dyn Calendar) -> Result<()> {
        if self.milestone || self.start == self.end {
            self.activities = vec![TaskActivity {
                start: self.start,
                end: self.start,
                working: calendar.is_working(self.start),
            }];
            return Ok(());
        }

        let activities: Vec<TaskActivity> = calendar
            .activities(self.start, self.end)
            .into_iter()
            .map(|span| TaskActivity {
                start: span.start,
                end: span.end,
                working: span.working,
            })
            .collect();

        let tiles = activities.first().map(|a| a.start) == Some(self.start)
            && activities.last().map(|a| a.end) == Some(self.end)
            && activities.windows(2).all(|pair| pair[0].end == pair[1].start);
        if !tiles {
            tracing::error!(task = self.id, start = %self.start, end = %self.end, "calendar activities do not tile task span");
            return Err(ScheduleError::CalendarGap {
                start: self.start,
                end: self.end,
            });
        }
        self.activities = activities;
        Ok(())
    }
}
