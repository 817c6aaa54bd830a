use chrono::NaiveDate;
use gantt_engine::calendar::SearchDirection;
use gantt_engine::{
    AlwaysWorkingCalendar, Calendar, DayType, TimeDuration, TimeUnit, WorkCalendar,
};
use proptest::prelude::*;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn shift_skips_weekend_both_ways() {
    let cal = WorkCalendar::weekend();
    // Fri 2024-01-05
    assert_eq!(cal.shift_date(d(2024, 1, 5), TimeDuration::days(1)), d(2024, 1, 6));
    assert_eq!(cal.shift_date(d(2024, 1, 5), TimeDuration::days(2)), d(2024, 1, 9));
    assert_eq!(cal.shift_date(d(2024, 1, 9), TimeDuration::days(-2)), d(2024, 1, 5));
    assert_eq!(cal.shift_date(d(2024, 1, 6), TimeDuration::ZERO), d(2024, 1, 6));
}

#[test]
fn week_duration_counts_working_days() {
    let cal = WorkCalendar::weekend();
    // Mon 2024-01-08 + one week of working days ends after Tue 2024-01-16
    assert_eq!(
        cal.shift_date(d(2024, 1, 8), TimeDuration::new(1, TimeUnit::Week)),
        d(2024, 1, 17)
    );
}

#[test]
fn month_duration_steps_frames_then_snaps_forward() {
    let cal = WorkCalendar::weekend();
    // Wed 2024-05-15 + 1 month lands on Sat 2024-06-15
    assert_eq!(
        cal.shift_date(d(2024, 5, 15), TimeDuration::new(1, TimeUnit::Month)),
        d(2024, 6, 17)
    );
}

#[test]
fn working_days_between_is_signed() {
    let cal = WorkCalendar::weekend();
    assert_eq!(cal.working_days_between(d(2024, 1, 4), d(2024, 1, 9)), 3);
    assert_eq!(cal.working_days_between(d(2024, 1, 9), d(2024, 1, 4)), -3);
    assert_eq!(cal.working_days_between(d(2024, 1, 6), d(2024, 1, 8)), 0);
}

#[test]
fn closest_search_honours_direction_and_status() {
    let cal = WorkCalendar::weekend();
    assert_eq!(
        cal.find_closest(d(2024, 1, 7), SearchDirection::Backward, true),
        Some(d(2024, 1, 5))
    );
    assert_eq!(
        cal.find_closest(d(2024, 1, 8), SearchDirection::Forward, false),
        Some(d(2024, 1, 13))
    );
    assert_eq!(cal.find_closest_working_time(d(2024, 1, 6)), d(2024, 1, 8));
}

#[test]
fn json_config_combines_holidays_and_recurring_events() {
    let text = r#"{
        "working_days": ["Mon", "Tue", "Wed", "Thu", "Fri"],
        "holidays": ["2024-07-04"],
        "events": [{ "date": "2000-12-25", "recurring": true }]
    }"#;
    let cal = WorkCalendar::from_json(text).unwrap();
    assert_eq!(cal.day_type(d(2024, 7, 4)), DayType::Holiday);
    assert_eq!(cal.day_type(d(2030, 12, 25)), DayType::Holiday);
    assert_eq!(cal.day_type(d(2024, 7, 6)), DayType::Weekend);
    assert!(cal.is_working(d(2024, 7, 5)));

    let restored = WorkCalendar::from_json(&cal.to_json().unwrap()).unwrap();
    assert_eq!(restored, cal);
}

#[test]
fn six_day_week_from_custom_working_days() {
    use chrono::Weekday::*;
    let cal = WorkCalendar::custom([Mon, Tue, Wed, Thu, Fri, Sat], [d(2024, 1, 10)]).unwrap();
    assert!(cal.is_working(d(2024, 1, 6)));
    assert!(!cal.is_working(d(2024, 1, 7)));
    assert_eq!(cal.day_type(d(2024, 1, 10)), DayType::Holiday);
}

#[test]
fn always_working_calendar_adds_calendar_days() {
    let cal = AlwaysWorkingCalendar;
    assert_eq!(cal.shift_date(d(2000, 1, 1), TimeDuration::days(3)), d(2000, 1, 4));
    assert_eq!(cal.working_days_between(d(2000, 1, 1), d(2000, 1, 8)), 7);
}

proptest! {
    #[test]
    fn shifting_there_and_back_lands_on_first_working_day(offset in 0i64..2000, days in 1i64..40) {
        let cal = WorkCalendar::weekend();
        let date = d(2020, 1, 1) + chrono::Duration::days(offset);
        let forward = cal.shift_date(date, TimeDuration::days(days));
        let back = cal.shift_date(forward, TimeDuration::days(-days));
        prop_assert_eq!(back, cal.find_closest_working_time(date));
    }

    #[test]
    fn shifted_span_holds_exactly_the_requested_working_days(offset in 0i64..2000, days in 0i64..40) {
        let cal = WorkCalendar::with_us_holidays(2020, 2026);
        let date = d(2020, 1, 1) + chrono::Duration::days(offset);
        let end = cal.shift_date(date, TimeDuration::days(days));
        prop_assert_eq!(cal.working_days_between(date, end), days);
    }
}
