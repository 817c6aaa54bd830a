use chrono::NaiveDate;
use gantt_engine::{
    AlwaysWorkingCalendar, ConstraintType, EngineConfig, Hardness, NewTask, RecordingObserver,
    TaskDependency, TaskId, TaskManager, TimeDuration, Variation, WorkCalendar,
};
use std::sync::Arc;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn always_working() -> TaskManager {
    init_tracing();
    TaskManager::new(Arc::new(AlwaysWorkingCalendar), EngineConfig::default()).unwrap()
}

fn weekdays_only() -> TaskManager {
    init_tracing();
    TaskManager::new(Arc::new(WorkCalendar::weekend()), EngineConfig::default()).unwrap()
}

fn add(mgr: &mut TaskManager, name: &str, start: NaiveDate, days: i64) -> TaskId {
    mgr.create_task(
        NewTask::new(name)
            .starting(start)
            .lasting(TimeDuration::days(days)),
    )
    .unwrap()
}

fn span(mgr: &TaskManager, id: TaskId) -> (NaiveDate, NaiveDate) {
    let task = mgr.task(id).unwrap();
    (task.start(), task.end())
}

#[test]
fn finish_start_chain_follows_first_task() {
    let mut mgr = always_working();
    let observer = RecordingObserver::new();
    mgr.set_observer(Arc::new(observer.clone()));

    let t1 = add(&mut mgr, "t1", d(2000, 1, 1), 1);
    let t2 = add(&mut mgr, "t2", d(2000, 1, 1), 1);
    let t3 = add(&mut mgr, "t3", d(2000, 1, 1), 1);
    mgr.create_dependency(TaskDependency::new(t2, t1)).unwrap();
    mgr.create_dependency(TaskDependency::new(t3, t2)).unwrap();
    assert_eq!(span(&mgr, t2), (d(2000, 1, 2), d(2000, 1, 3)));
    assert_eq!(span(&mgr, t3), (d(2000, 1, 3), d(2000, 1, 4)));

    observer.take();
    mgr.set_start(t1, d(2000, 1, 3)).unwrap();
    assert_eq!(span(&mgr, t2), (d(2000, 1, 4), d(2000, 1, 5)));
    assert_eq!(span(&mgr, t3), (d(2000, 1, 5), d(2000, 1, 6)));
    assert_eq!(observer.rescheduled_tasks(), vec![t2, t3]);
}

#[test]
fn finish_start_chain_follows_first_task_end() {
    let mut mgr = always_working();
    let t1 = add(&mut mgr, "t1", d(2000, 1, 1), 1);
    let t2 = add(&mut mgr, "t2", d(2000, 1, 1), 1);
    let t3 = add(&mut mgr, "t3", d(2000, 1, 1), 1);
    mgr.create_dependency(TaskDependency::new(t2, t1)).unwrap();
    mgr.create_dependency(TaskDependency::new(t3, t2)).unwrap();

    mgr.set_end(t1, d(2000, 1, 3)).unwrap();
    assert_eq!(span(&mgr, t1), (d(2000, 1, 1), d(2000, 1, 3)));
    assert_eq!(span(&mgr, t2), (d(2000, 1, 3), d(2000, 1, 4)));
    assert_eq!(span(&mgr, t3), (d(2000, 1, 4), d(2000, 1, 5)));
}

#[test]
fn finish_start_skips_weekend() {
    let mut mgr = weekdays_only();
    // Thu 2024-01-04, two working days end on Sat 2024-01-06
    let t1 = add(&mut mgr, "t1", d(2024, 1, 4), 2);
    let t2 = add(&mut mgr, "t2", d(2024, 1, 1), 1);
    mgr.create_dependency(TaskDependency::new(t2, t1)).unwrap();
    assert_eq!(span(&mgr, t1), (d(2024, 1, 4), d(2024, 1, 6)));
    assert_eq!(span(&mgr, t2), (d(2024, 1, 8), d(2024, 1, 9)));
}

#[test]
fn lag_is_counted_in_working_days() {
    let mut mgr = weekdays_only();
    let t1 = add(&mut mgr, "t1", d(2024, 1, 4), 2);
    let t2 = add(&mut mgr, "t2", d(2024, 1, 1), 1);
    let t3 = add(&mut mgr, "t3", d(2024, 1, 1), 1);
    mgr.create_dependency(TaskDependency::new(t2, t1).with_lag(2))
        .unwrap();
    mgr.create_dependency(TaskDependency::new(t3, t1).with_lag(-1))
        .unwrap();
    assert_eq!(mgr.task(t2).unwrap().start(), d(2024, 1, 10));
    assert_eq!(span(&mgr, t3), (d(2024, 1, 5), d(2024, 1, 6)));
}

#[test]
fn strong_dependant_is_pulled_back_rubber_stays() {
    let mut mgr = weekdays_only();
    let t1 = add(&mut mgr, "t1", d(2024, 1, 4), 2);
    let strong = add(&mut mgr, "strong", d(2024, 1, 15), 1);
    let rubber = add(&mut mgr, "rubber", d(2024, 1, 15), 1);
    mgr.create_dependency(TaskDependency::new(strong, t1)).unwrap();
    mgr.create_dependency(TaskDependency::new(rubber, t1).with_hardness(Hardness::Rubber))
        .unwrap();

    assert_eq!(mgr.task(strong).unwrap().start(), d(2024, 1, 8));
    assert_eq!(mgr.task(rubber).unwrap().start(), d(2024, 1, 15));
    let collision = mgr.collision_of(rubber, t1).unwrap();
    assert!(!collision.violated);
    assert_eq!(collision.variation, Variation::NoVariation);
}

#[test]
fn rubber_start_never_decreases() {
    let mut mgr = weekdays_only();
    let t1 = add(&mut mgr, "t1", d(2024, 1, 4), 2);
    let strong = add(&mut mgr, "strong", d(2024, 1, 1), 1);
    let rubber = add(&mut mgr, "rubber", d(2024, 1, 1), 1);
    mgr.create_dependency(TaskDependency::new(strong, t1)).unwrap();
    mgr.create_dependency(TaskDependency::new(rubber, t1).with_hardness(Hardness::Rubber))
        .unwrap();

    // Mon 2024-01-15, ends Wed 2024-01-17
    mgr.set_start(t1, d(2024, 1, 15)).unwrap();
    assert_eq!(mgr.task(strong).unwrap().start(), d(2024, 1, 17));
    assert_eq!(mgr.task(rubber).unwrap().start(), d(2024, 1, 17));

    // Back to Mon 2024-01-08, ends Wed 2024-01-10
    mgr.set_start(t1, d(2024, 1, 8)).unwrap();
    assert_eq!(mgr.task(strong).unwrap().start(), d(2024, 1, 10));
    assert_eq!(mgr.task(rubber).unwrap().start(), d(2024, 1, 17));
}

#[test]
fn finish_finish_aligns_ends() {
    let mut mgr = weekdays_only();
    // Mon 2024-01-08 + 3 working days ends Thu 2024-01-11
    let t1 = add(&mut mgr, "t1", d(2024, 1, 8), 3);
    let t2 = add(&mut mgr, "t2", d(2024, 1, 1), 2);
    mgr.create_dependency(
        TaskDependency::new(t2, t1).with_constraint(ConstraintType::FinishFinish),
    )
    .unwrap();
    assert_eq!(span(&mgr, t2), (d(2024, 1, 9), d(2024, 1, 11)));
}

#[test]
fn start_start_and_start_finish() {
    let mut mgr = weekdays_only();
    let t1 = add(&mut mgr, "t1", d(2024, 1, 8), 3);
    let ss = add(&mut mgr, "ss", d(2024, 1, 1), 1);
    let sf = add(&mut mgr, "sf", d(2024, 1, 1), 1);
    mgr.create_dependency(
        TaskDependency::new(ss, t1)
            .with_constraint(ConstraintType::StartStart)
            .with_lag(1),
    )
    .unwrap();
    mgr.create_dependency(
        TaskDependency::new(sf, t1).with_constraint(ConstraintType::StartFinish),
    )
    .unwrap();
    assert_eq!(mgr.task(ss).unwrap().start(), d(2024, 1, 9));
    // Ends when t1 starts: Fri 2024-01-05 .. Sat 2024-01-06
    assert_eq!(span(&mgr, sf), (d(2024, 1, 5), d(2024, 1, 6)));
}

#[test]
fn inherited_constraint_pushes_subtask_but_never_pulls_it_back() {
    let mut mgr = always_working();
    let dependee = add(&mut mgr, "dependee", d(2000, 1, 3), 2);
    let parent = add(&mut mgr, "parent", d(2000, 1, 1), 1);
    let child = mgr
        .create_task(
            NewTask::new("child")
                .starting(d(2000, 1, 1))
                .lasting(TimeDuration::days(3))
                .under(parent),
        )
        .unwrap();
    assert_eq!(span(&mgr, parent), (d(2000, 1, 1), d(2000, 1, 4)));

    mgr.create_dependency(TaskDependency::new(parent, dependee)).unwrap();
    assert_eq!(span(&mgr, child), (d(2000, 1, 5), d(2000, 1, 8)));
    assert_eq!(span(&mgr, parent), (d(2000, 1, 5), d(2000, 1, 8)));

    mgr.set_start(child, d(2000, 1, 10)).unwrap();
    assert_eq!(span(&mgr, child), (d(2000, 1, 10), d(2000, 1, 13)));
    assert_eq!(span(&mgr, parent), (d(2000, 1, 10), d(2000, 1, 13)));
}

#[test]
fn earliest_start_pins_task() {
    let mut mgr = always_working();
    let task = add(&mut mgr, "t", d(2000, 1, 1), 2);
    mgr.set_earliest_start(task, Some(d(2000, 1, 5))).unwrap();
    assert_eq!(span(&mgr, task), (d(2000, 1, 5), d(2000, 1, 7)));

    mgr.set_start(task, d(2000, 1, 2)).unwrap();
    assert_eq!(mgr.task(task).unwrap().start(), d(2000, 1, 5));

    mgr.set_start(task, d(2000, 1, 9)).unwrap();
    assert_eq!(mgr.task(task).unwrap().start(), d(2000, 1, 5));

    mgr.set_earliest_start(task, None).unwrap();
    mgr.set_start(task, d(2000, 1, 9)).unwrap();
    assert_eq!(mgr.task(task).unwrap().start(), d(2000, 1, 9));
}

#[test]
fn supertask_end_skips_trailing_weekend() {
    let mut mgr = weekdays_only();
    let parent = add(&mut mgr, "parent", d(2024, 1, 4), 1);
    let first = mgr
        .create_task(
            NewTask::new("first")
                .starting(d(2024, 1, 4))
                .lasting(TimeDuration::days(2))
                .under(parent),
        )
        .unwrap();
    // Milestone on Mon 2024-01-08
    mgr.create_task(
        NewTask::new("marker")
            .starting(d(2024, 1, 8))
            .milestone()
            .under(parent),
    )
    .unwrap();

    assert_eq!(span(&mgr, first), (d(2024, 1, 4), d(2024, 1, 6)));
    assert_eq!(span(&mgr, parent), (d(2024, 1, 4), d(2024, 1, 6)));
}

#[test]
fn disabled_scheduler_leaves_dependants_until_recalculated() {
    let mut mgr = always_working();
    mgr.set_scheduler_enabled(false);
    let t1 = add(&mut mgr, "t1", d(2000, 1, 1), 2);
    let t2 = add(&mut mgr, "t2", d(2000, 1, 1), 1);
    mgr.create_dependency(TaskDependency::new(t2, t1)).unwrap();
    assert_eq!(mgr.task(t2).unwrap().start(), d(2000, 1, 1));

    let collision = mgr.collision_of(t2, t1).unwrap();
    assert!(collision.violated);
    assert_eq!(collision.variation, Variation::StartLater);
    assert_eq!(collision.acceptable_start, d(2000, 1, 3));

    let modified = mgr.recalculate_schedule().unwrap();
    assert!(modified.contains(&t2));
    assert_eq!(mgr.task(t2).unwrap().start(), d(2000, 1, 3));
}

#[test]
fn recalculation_is_idempotent() {
    let mut mgr = weekdays_only();
    let t1 = add(&mut mgr, "t1", d(2024, 1, 4), 2);
    let t2 = add(&mut mgr, "t2", d(2024, 1, 1), 3);
    let parent = add(&mut mgr, "parent", d(2024, 1, 1), 1);
    mgr.create_task(
        NewTask::new("child")
            .starting(d(2024, 1, 2))
            .lasting(TimeDuration::days(4))
            .under(parent),
    )
    .unwrap();
    mgr.create_dependency(TaskDependency::new(t2, t1)).unwrap();
    mgr.create_dependency(TaskDependency::new(parent, t2).with_hardness(Hardness::Rubber))
        .unwrap();

    mgr.recalculate_schedule().unwrap();
    let before: Vec<_> = mgr.tasks().map(|t| (t.id, t.start(), t.end())).collect();
    assert!(mgr.recalculate_schedule().unwrap().is_empty());
    let after: Vec<_> = mgr.tasks().map(|t| (t.id, t.start(), t.end())).collect();
    assert_eq!(before, after);
}

#[test]
fn updating_dependency_reschedules_dependant() {
    let mut mgr = always_working();
    let t1 = add(&mut mgr, "t1", d(2000, 1, 1), 2);
    let t2 = add(&mut mgr, "t2", d(2000, 1, 1), 1);
    mgr.create_dependency(TaskDependency::new(t2, t1)).unwrap();
    assert_eq!(mgr.task(t2).unwrap().start(), d(2000, 1, 3));

    mgr.update_dependency(TaskDependency::new(t2, t1).with_lag(3))
        .unwrap();
    assert_eq!(mgr.task(t2).unwrap().start(), d(2000, 1, 6));
}

#[test]
fn deleted_dependency_stops_propagation() {
    let mut mgr = always_working();
    let t1 = add(&mut mgr, "t1", d(2000, 1, 1), 2);
    let t2 = add(&mut mgr, "t2", d(2000, 1, 1), 1);
    mgr.create_dependency(TaskDependency::new(t2, t1)).unwrap();

    mgr.shift_task(t1, TimeDuration::days(2)).unwrap();
    assert_eq!(span(&mgr, t1), (d(2000, 1, 3), d(2000, 1, 5)));
    assert_eq!(span(&mgr, t2), (d(2000, 1, 5), d(2000, 1, 6)));

    let removed = mgr.delete_dependency(t2, t1).unwrap();
    assert_eq!(removed.map(|dep| dep.key()), Some((t2, t1)));
    assert!(mgr.graph().incoming(t2).is_empty());

    mgr.shift_task(t1, TimeDuration::days(-2)).unwrap();
    assert_eq!(span(&mgr, t1), (d(2000, 1, 1), d(2000, 1, 3)));
    assert_eq!(span(&mgr, t2), (d(2000, 1, 5), d(2000, 1, 6)));
    assert!(mgr.delete_dependency(t2, t1).unwrap().is_none());
}

#[test]
fn swapping_calendar_rebuilds_task_ends() {
    let mut mgr = always_working();
    let task = add(&mut mgr, "task", d(2024, 1, 5), 2);
    assert_eq!(span(&mgr, task), (d(2024, 1, 5), d(2024, 1, 7)));

    mgr.set_calendar(Arc::new(WorkCalendar::weekend())).unwrap();
    assert_eq!(span(&mgr, task), (d(2024, 1, 5), d(2024, 1, 9)));
    assert_eq!(mgr.task(task).unwrap().activities().len(), 3);

    mgr.rename_task(task, "renamed").unwrap();
    assert_eq!(mgr.task(task).unwrap().name, "renamed");
}
