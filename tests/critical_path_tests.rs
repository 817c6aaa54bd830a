use chrono::NaiveDate;
use gantt_engine::{
    AlwaysWorkingCalendar, CriticalScope, EngineConfig, NewTask, ScheduleError, TaskDependency,
    TaskId, TaskManager, TimeDuration, WorkCalendar,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn manager() -> TaskManager {
    TaskManager::new(Arc::new(AlwaysWorkingCalendar), EngineConfig::default()).unwrap()
}

fn add(mgr: &mut TaskManager, name: &str, days: i64, parent: Option<TaskId>) -> TaskId {
    let mut new_task = NewTask::new(name)
        .starting(d(2000, 1, 1))
        .lasting(TimeDuration::days(days));
    if let Some(parent) = parent {
        new_task = new_task.under(parent);
    }
    mgr.create_task(new_task).unwrap()
}

fn link(mgr: &mut TaskManager, dependant: TaskId, dependee: TaskId) {
    mgr.create_dependency(TaskDependency::new(dependant, dependee))
        .unwrap();
}

#[test]
fn longest_chain_is_critical() {
    let mut mgr = manager();
    let a = add(&mut mgr, "a", 2, None);
    let b = add(&mut mgr, "b", 3, None);
    let c = add(&mut mgr, "c", 1, None);
    let d_task = add(&mut mgr, "d", 1, None);
    link(&mut mgr, b, a);
    link(&mut mgr, c, b);
    assert_eq!(mgr.task(c).unwrap().start(), d(2000, 1, 6));

    let critical = mgr.critical_tasks(CriticalScope::Project).unwrap();
    assert_eq!(critical, BTreeSet::from([a, b, c]));
    assert!(!critical.contains(&d_task));
}

#[test]
fn unlinked_task_reaching_project_end_is_critical() {
    let mut mgr = manager();
    let a = add(&mut mgr, "a", 2, None);
    let b = add(&mut mgr, "b", 3, None);
    let c = add(&mut mgr, "c", 1, None);
    let long = add(&mut mgr, "long", 6, None);
    link(&mut mgr, b, a);
    link(&mut mgr, c, b);

    let critical = mgr.critical_tasks(CriticalScope::Project).unwrap();
    assert_eq!(critical, BTreeSet::from([a, b, c, long]));
}

#[test]
fn tied_predecessors_are_both_critical() {
    let mut mgr = manager();
    let a = add(&mut mgr, "a", 2, None);
    let b = add(&mut mgr, "b", 2, None);
    let short = add(&mut mgr, "short", 1, None);
    let c = add(&mut mgr, "c", 1, None);
    link(&mut mgr, c, a);
    link(&mut mgr, c, b);
    link(&mut mgr, c, short);

    let critical = mgr.critical_tasks(CriticalScope::Project).unwrap();
    assert_eq!(critical, BTreeSet::from([a, b, c]));
}

#[test]
fn chain_with_slack_is_not_critical() {
    let mut mgr = manager();
    let x = add(&mut mgr, "x", 1, None);
    let y = add(&mut mgr, "y", 1, None);
    let z = add(&mut mgr, "z", 5, None);
    link(&mut mgr, y, x);

    let critical = mgr.critical_tasks(CriticalScope::Project).unwrap();
    assert_eq!(critical, BTreeSet::from([z]));
}

#[test]
fn subtree_scope_uses_supertask_bounds() {
    let mut mgr = manager();
    let summary = add(&mut mgr, "summary", 1, None);
    let first = add(&mut mgr, "first", 2, Some(summary));
    let second = add(&mut mgr, "second", 1, Some(summary));
    let spare = add(&mut mgr, "spare", 1, Some(summary));
    let long = add(&mut mgr, "long", 10, None);
    link(&mut mgr, second, first);
    assert_eq!(mgr.task(summary).unwrap().end(), d(2000, 1, 4));

    let global = mgr.critical_tasks(CriticalScope::Project).unwrap();
    assert_eq!(global, BTreeSet::from([long]));

    let local = mgr.critical_tasks(CriticalScope::Subtree(summary)).unwrap();
    assert_eq!(local, BTreeSet::from([first, second]));
    assert!(!local.contains(&spare));

    mgr.delete_task(long).unwrap();
    let global = mgr.critical_tasks(CriticalScope::Project).unwrap();
    assert_eq!(global, BTreeSet::from([summary, first, second]));
}

#[test]
fn critical_flags_are_stored_on_tasks() {
    let mut mgr = manager();
    let a = add(&mut mgr, "a", 2, None);
    let b = add(&mut mgr, "b", 1, None);
    let idle = add(&mut mgr, "idle", 1, None);
    link(&mut mgr, b, a);

    let marked = mgr.mark_critical_tasks().unwrap();
    assert_eq!(marked, BTreeSet::from([a, b]));
    assert!(mgr.task(a).unwrap().is_critical());
    assert!(mgr.task(b).unwrap().is_critical());
    assert!(!mgr.task(idle).unwrap().is_critical());
}

#[test]
fn empty_project_has_no_critical_tasks() {
    let mgr = manager();
    assert!(mgr.critical_tasks(CriticalScope::Project).unwrap().is_empty());
    assert!(matches!(
        mgr.critical_tasks(CriticalScope::Subtree(3)),
        Err(ScheduleError::InvalidReference(3))
    ));
}

#[test]
fn weekend_calendar_chain_and_weekend_start() {
    let mut mgr =
        TaskManager::new(Arc::new(WorkCalendar::weekend()), EngineConfig::default()).unwrap();
    let task = |mgr: &mut TaskManager, name: &str, start: NaiveDate, days: i64| {
        mgr.create_task(
            NewTask::new(name)
                .starting(start)
                .lasting(TimeDuration::days(days)),
        )
        .unwrap()
    };
    // Thu 2024-01-04 for two days ends after Friday; its dependant lands on Monday.
    let first = task(&mut mgr, "first", d(2024, 1, 4), 2);
    let second = task(&mut mgr, "second", d(2024, 1, 4), 1);
    let saturday = task(&mut mgr, "saturday", d(2024, 1, 6), 1);
    let early = task(&mut mgr, "early", d(2024, 1, 5), 1);
    link(&mut mgr, second, first);

    assert_eq!(mgr.task(second).unwrap().start(), d(2024, 1, 8));
    assert_eq!(mgr.task(saturday).unwrap().end(), d(2024, 1, 9));
    assert_eq!(mgr.project_end(), Some(d(2024, 1, 9)));

    let critical = mgr.critical_tasks(CriticalScope::Project).unwrap();
    assert_eq!(critical, BTreeSet::from([first, second, saturday]));
    assert!(!critical.contains(&early));
}
