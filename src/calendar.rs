use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, ScheduleError};
use crate::time_unit::TimeDuration;

/// Longest run of days a calendar search walks before giving up.
const SEARCH_LIMIT_DAYS: i64 = 3660;

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayType {
    Working,
    Weekend,
    Holiday,
    NonWorking,
}

impl DayType {
    pub fn is_working(self) -> bool {
        self == DayType::Working
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Holiday,
    WorkingDay,
    Neutral,
}

fn default_event_kind() -> EventKind {
    EventKind::Holiday
}

/// A dated calendar entry. Recurring events match the same month and day every year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub date: NaiveDate,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default = "default_event_kind")]
    pub kind: EventKind,
    #[serde(default)]
    pub title: Option<String>,
}

impl CalendarEvent {
    pub fn holiday(date: NaiveDate) -> Self {
        Self {
            date,
            recurring: false,
            kind: EventKind::Holiday,
            title: None,
        }
    }

    pub fn recurring_holiday(date: NaiveDate) -> Self {
        Self {
            recurring: true,
            ..Self::holiday(date)
        }
    }

    pub fn working_day(date: NaiveDate) -> Self {
        Self {
            kind: EventKind::WorkingDay,
            ..Self::holiday(date)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn day_type(&self) -> Option<DayType> {
        match self.kind {
            EventKind::Holiday => Some(DayType::Holiday),
            EventKind::WorkingDay => Some(DayType::Working),
            EventKind::Neutral => None,
        }
    }
}

/// A maximal run of days with the same working status, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarActivity {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub working: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

/// Working-time calendar consulted by every date computation of the engine.
pub trait Calendar: fmt::Debug + Send + Sync {
    fn day_type(&self, date: NaiveDate) -> DayType;

    fn is_working(&self, date: NaiveDate) -> bool {
        self.day_type(date).is_working()
    }

    /// Splits `[start, end)` into ordered runs of uniform working status.
    fn activities(&self, start: NaiveDate, end: NaiveDate) -> Vec<CalendarActivity> {
        let mut result = Vec::new();
        let mut current = start;
        while current < end {
            let working = self.is_working(current);
            let mut next = current + Duration::days(1);
            while next < end && self.is_working(next) == working {
                next += Duration::days(1);
            }
            result.push(CalendarActivity {
                start: current,
                end: next,
                working,
            });
            current = next;
        }
        result
    }

    /// Adds `duration` of working time to `date`, skipping non-working days.
    fn shift_date(&self, date: NaiveDate, duration: TimeDuration) -> NaiveDate {
        if duration.is_zero() {
            return date;
        }
        match duration.as_days() {
            Some(days) => shift_working_days(self, date, days),
            None => {
                let stepped = duration.unit.step(date, duration.length);
                self.find_closest_working_time(stepped)
            }
        }
    }

    fn find_closest_working_time(&self, date: NaiveDate) -> NaiveDate {
        self.find_closest(date, SearchDirection::Forward, true)
            .unwrap_or(date)
    }

    /// Nearest day (including `date`) whose working status equals `working`.
    fn find_closest(
        &self,
        date: NaiveDate,
        direction: SearchDirection,
        working: bool,
    ) -> Option<NaiveDate> {
        let step = match direction {
            SearchDirection::Forward => Duration::days(1),
            SearchDirection::Backward => Duration::days(-1),
        };
        let mut current = date;
        for _ in 0..SEARCH_LIMIT_DAYS {
            if self.is_working(current) == working {
                return Some(current);
            }
            current += step;
        }
        None
    }

    /// Working days in `[start, end)`; negative when `end` precedes `start`.
    fn working_days_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        if end < start {
            return -self.working_days_between(end, start);
        }
        self.activities(start, end)
            .iter()
            .filter(|activity| activity.working)
            .map(|activity| (activity.end - activity.start).num_days())
            .sum()
    }
}

fn shift_working_days<C: Calendar + ?Sized>(calendar: &C, date: NaiveDate, days: i64) -> NaiveDate {
    let mut remaining = days.abs();
    let budget = remaining * 7 + SEARCH_LIMIT_DAYS;
    let mut current = date;
    for _ in 0..budget {
        if days > 0 {
            if calendar.is_working(current) {
                remaining -= 1;
                if remaining == 0 {
                    return current + Duration::days(1);
                }
            }
            current += Duration::days(1);
        } else {
            current -= Duration::days(1);
            if calendar.is_working(current) {
                remaining -= 1;
                if remaining == 0 {
                    return current;
                }
            }
        }
    }
    tracing::error!(%date, days, "calendar has no working time within the search window");
    current
}

/// Calendar in which every day is working.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysWorkingCalendar;

impl Calendar for AlwaysWorkingCalendar {
    fn day_type(&self, _date: NaiveDate) -> DayType {
        DayType::Working
    }

    fn activities(&self, start: NaiveDate, end: NaiveDate) -> Vec<CalendarActivity> {
        if start >= end {
            return Vec::new();
        }
        vec![CalendarActivity {
            start,
            end,
            working: true,
        }]
    }

    fn shift_date(&self, date: NaiveDate, duration: TimeDuration) -> NaiveDate {
        match duration.as_days() {
            Some(days) => date + Duration::days(days),
            None => duration.unit.step(date, duration.length),
        }
    }

    fn working_days_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        (end - start).num_days()
    }
}

/// Weekday table plus one-off and recurring events.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkCalendar {
    weekdays: [DayType; 7],
    events: BTreeMap<NaiveDate, CalendarEvent>,
    recurring: BTreeMap<(u32, u32), CalendarEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCalendarConfig {
    working_days: Vec<Weekday>,
    #[serde(default)]
    holidays: Vec<NaiveDate>,
    #[serde(default)]
    events: Vec<CalendarEvent>,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::weekend()
    }
}

impl Calendar for WorkCalendar {
    fn day_type(&self, date: NaiveDate) -> DayType {
        if let Some(day_type) = self.events.get(&date).and_then(CalendarEvent::day_type) {
            return day_type;
        }
        if let Some(day_type) = self
            .recurring
            .get(&(date.month(), date.day()))
            .and_then(CalendarEvent::day_type)
        {
            return day_type;
        }
        self.weekday_type(date.weekday())
    }
}

impl WorkCalendar {
    /// Calendar where every weekday is working and no events are set.
    pub fn new() -> Self {
        Self {
            weekdays: [DayType::Working; 7],
            events: BTreeMap::new(),
            recurring: BTreeMap::new(),
        }
    }

    /// Mon-Fri work week, Saturday and Sunday are weekend days.
    pub fn weekend() -> Self {
        let mut calendar = Self::new();
        calendar.set_weekday_type(Weekday::Sat, DayType::Weekend);
        calendar.set_weekday_type(Weekday::Sun, DayType::Weekend);
        calendar
    }

    /// Mon-Fri calendar with US federal holidays for a range of years (inclusive)
    pub fn with_us_holidays(start_year: i32, end_year: i32) -> Self {
        let (start, end) = if start_year <= end_year {
            (start_year, end_year)
        } else {
            (end_year, start_year)
        };
        let mut calendar = Self::weekend();

        for (month, day, title) in [
            (1, 1, "New Year's Day"),
            (7, 4, "Independence Day"),
            (11, 11, "Veterans Day"),
            (12, 25, "Christmas"),
        ] {
            if let Some(date) = NaiveDate::from_ymd_opt(start, month, day) {
                calendar.add_event(CalendarEvent::recurring_holiday(date).with_title(title));
            }
        }

        for year in start..=end {
            let anchored = [
                (Self::nth_weekday(year, 1, Weekday::Mon, 3), "Martin Luther King Jr. Day"),
                (Self::nth_weekday(year, 2, Weekday::Mon, 3), "Presidents' Day"),
                (Self::last_weekday(year, 5, Weekday::Mon), "Memorial Day"),
                (Self::nth_weekday(year, 9, Weekday::Mon, 1), "Labor Day"),
                (Self::nth_weekday(year, 10, Weekday::Mon, 2), "Columbus Day"),
                (Self::nth_weekday(year, 11, Weekday::Thu, 4), "Thanksgiving"),
            ];
            for (date, title) in anchored {
                if let Some(date) = date {
                    calendar.add_event(CalendarEvent::holiday(date).with_title(title));
                }
            }
        }
        calendar
    }

    pub fn custom<I, J>(working_days: I, holidays: J) -> Result<Self>
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let config = WorkCalendarConfig::new(working_days, holidays);
        Self::from_config(&config)
    }

    pub fn from_config(config: &WorkCalendarConfig) -> Result<Self> {
        if config.working_days.is_empty() {
            return Err(ScheduleError::Config(
                "calendar requires at least one working day".into(),
            ));
        }
        let mut calendar = Self::new();
        calendar.set_working_days(config.working_days.clone());
        for date in &config.holidays {
            calendar.add_holiday(*date);
        }
        for event in &config.events {
            calendar.add_event(event.clone());
        }
        Ok(calendar)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: WorkCalendarConfig = serde_json::from_str(text)?;
        Self::from_config(&config)
    }

    pub fn to_config(&self) -> WorkCalendarConfig {
        WorkCalendarConfig::from(self)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_config())?)
    }

    /// Helper: Find the nth occurrence of a weekday in a month
    fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
        let mut date = NaiveDate::from_ymd_opt(year, month, 1)?;
        let mut count = 0;
        while date.month() == month {
            if date.weekday() == weekday {
                count += 1;
                if count == n {
                    return Some(date);
                }
            }
            date += Duration::days(1);
        }
        None
    }

    /// Helper: Find the last occurrence of a weekday in a month
    fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        let mut date = next_month - Duration::days(1);
        while date.weekday() != weekday {
            date -= Duration::days(1);
        }
        Some(date)
    }

    pub fn weekday_type(&self, weekday: Weekday) -> DayType {
        self.weekdays[weekday.num_days_from_monday() as usize]
    }

    pub fn set_weekday_type(&mut self, weekday: Weekday, day_type: DayType) {
        self.weekdays[weekday.num_days_from_monday() as usize] = day_type;
    }

    /// Set custom working days (e.g., Mon-Sat for 6-day weeks)
    pub fn set_working_days(&mut self, days: Vec<Weekday>) {
        for day in ALL_WEEKDAYS {
            let day_type = if days.contains(&day) {
                DayType::Working
            } else {
                DayType::Weekend
            };
            self.set_weekday_type(day, day_type);
        }
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.add_event(CalendarEvent::holiday(date));
    }

    pub fn add_holidays(&mut self, dates: &[NaiveDate]) {
        for date in dates {
            self.add_holiday(*date);
        }
    }

    /// Holiday repeating every year on `month`/`day`.
    pub fn add_recurring_holiday(&mut self, month: u32, day: u32) -> Result<()> {
        // 2000 is a leap year so Feb 29 is representable
        let date = NaiveDate::from_ymd_opt(2000, month, day).ok_or_else(|| {
            ScheduleError::Config(format!("invalid recurring date {month}/{day}"))
        })?;
        self.add_event(CalendarEvent::recurring_holiday(date));
        Ok(())
    }

    /// Makes a single date working regardless of its weekday.
    pub fn add_working_day(&mut self, date: NaiveDate) {
        self.add_event(CalendarEvent::working_day(date));
    }

    pub fn add_event(&mut self, event: CalendarEvent) {
        if event.recurring {
            self.recurring
                .insert((event.date.month(), event.date.day()), event);
        } else {
            self.events.insert(event.date, event);
        }
    }

    pub fn remove_event(&mut self, date: NaiveDate) -> Option<CalendarEvent> {
        self.events.remove(&date)
    }

    pub fn events(&self) -> impl Iterator<Item = &CalendarEvent> {
        self.recurring.values().chain(self.events.values())
    }
}

impl WorkCalendarConfig {
    pub fn new<I, J>(working_days: I, holidays: J) -> Self
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let mut working_days: Vec<Weekday> = working_days.into_iter().collect();
        working_days.sort_by_key(|day| day.num_days_from_monday());
        working_days.dedup();

        let mut holidays: Vec<NaiveDate> = holidays.into_iter().collect();
        holidays.sort();
        holidays.dedup();

        Self {
            working_days,
            holidays,
            events: Vec::new(),
        }
    }

    pub fn working_days(&self) -> &[Weekday] {
        &self.working_days
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }
}

impl Default for WorkCalendarConfig {
    fn default() -> Self {
        WorkCalendar::default().to_config()
    }
}

impl From<&WorkCalendar> for WorkCalendarConfig {
    fn from(calendar: &WorkCalendar) -> Self {
        let working_days = ALL_WEEKDAYS
            .into_iter()
            .filter(|day| calendar.weekday_type(*day).is_working())
            .collect();
        Self {
            working_days,
            holidays: Vec::new(),
            events: calendar.events().cloned().collect(),
        }
    }
}
