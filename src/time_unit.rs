use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Granularity of schedule arithmetic.
///
/// `Day` and `Month` are atomic; `Week`, `Quarter` and `Year` are composed of
/// a whole number of their sub-unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeUnit {
    /// Immediate sub-unit and how many of it make up one `self`.
    pub fn sub_unit(self) -> Option<(TimeUnit, u32)> {
        match self {
            TimeUnit::Day | TimeUnit::Month => None,
            TimeUnit::Week => Some((TimeUnit::Day, 7)),
            TimeUnit::Quarter => Some((TimeUnit::Month, 3)),
            TimeUnit::Year => Some((TimeUnit::Quarter, 4)),
        }
    }

    pub fn is_composite(self) -> bool {
        self.sub_unit().is_some()
    }

    /// Start of the unit containing `date`.
    pub fn adjust_left(self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeUnit::Day => date,
            TimeUnit::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            TimeUnit::Month => date.with_day(1).unwrap_or(date),
            TimeUnit::Quarter => {
                let first_month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date)
            }
            TimeUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    /// Start of the unit following the one containing `date`.
    pub fn adjust_right(self, date: NaiveDate) -> NaiveDate {
        let left = self.adjust_left(date);
        self.step(left, 1)
    }

    /// Start of the unit preceding the one containing `date`.
    pub fn jump_left(self, date: NaiveDate) -> NaiveDate {
        let left = self.adjust_left(date);
        self.step(left, -1)
    }

    /// Moves a unit boundary by `count` whole units in calendar time.
    pub fn step(self, date: NaiveDate, count: i64) -> NaiveDate {
        match self {
            TimeUnit::Day => date + Duration::days(count),
            TimeUnit::Week => date + Duration::days(count * 7),
            TimeUnit::Month => add_months(date, count),
            TimeUnit::Quarter => add_months(date, count * 3),
            TimeUnit::Year => add_months(date, count * 12),
        }
    }
}

fn add_months(date: NaiveDate, count: i64) -> NaiveDate {
    let months = Months::new(count.unsigned_abs().min(u32::MAX as u64) as u32);
    let shifted = if count >= 0 {
        date.checked_add_months(months)
    } else {
        date.checked_sub_months(months)
    };
    shifted.unwrap_or(date)
}

/// A signed amount of time expressed in a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeDuration {
    pub length: i64,
    pub unit: TimeUnit,
}

impl TimeDuration {
    pub const ZERO: TimeDuration = TimeDuration {
        length: 0,
        unit: TimeUnit::Day,
    };

    pub fn new(length: i64, unit: TimeUnit) -> Self {
        Self { length, unit }
    }

    pub fn days(length: i64) -> Self {
        Self::new(length, TimeUnit::Day)
    }

    pub fn is_zero(&self) -> bool {
        self.length == 0
    }

    pub fn reverse(self) -> Self {
        Self::new(-self.length, self.unit)
    }

    /// Length in days for day-composed units; `None` for month-framed ones.
    pub fn as_days(&self) -> Option<i64> {
        match self.unit {
            TimeUnit::Day => Some(self.length),
            TimeUnit::Week => Some(self.length * 7),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn composite_units_are_integral_multiples() {
        assert_eq!(TimeUnit::Week.sub_unit(), Some((TimeUnit::Day, 7)));
        assert_eq!(TimeUnit::Quarter.sub_unit(), Some((TimeUnit::Month, 3)));
        assert_eq!(TimeUnit::Year.sub_unit(), Some((TimeUnit::Quarter, 4)));
        assert!(!TimeUnit::Day.is_composite());
        assert!(!TimeUnit::Month.is_composite());
    }

    #[test]
    fn adjust_and_jump_snap_to_unit_boundaries() {
        // 2024-05-15 is a Wednesday
        let date = d(2024, 5, 15);
        assert_eq!(TimeUnit::Week.adjust_left(date), d(2024, 5, 13));
        assert_eq!(TimeUnit::Week.adjust_right(date), d(2024, 5, 20));
        assert_eq!(TimeUnit::Month.adjust_left(date), d(2024, 5, 1));
        assert_eq!(TimeUnit::Month.jump_left(date), d(2024, 4, 1));
        assert_eq!(TimeUnit::Quarter.adjust_left(date), d(2024, 4, 1));
        assert_eq!(TimeUnit::Quarter.adjust_right(date), d(2024, 7, 1));
        assert_eq!(TimeUnit::Year.jump_left(date), d(2023, 1, 1));
        assert_eq!(TimeUnit::Day.adjust_right(date), d(2024, 5, 16));
    }

    #[test]
    fn week_durations_convert_to_days() {
        assert_eq!(TimeDuration::new(2, TimeUnit::Week).as_days(), Some(14));
        assert_eq!(TimeDuration::new(1, TimeUnit::Month).as_days(), None);
        assert_eq!(TimeDuration::days(3).reverse(), TimeDuration::days(-3));
    }
}
