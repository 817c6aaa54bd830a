use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::calculations::{AdjustBounds, CompletionAggregator, CriticalPath, CriticalScope, Scheduler};
use crate::calendar::Calendar;
use crate::config::EngineConfig;
use crate::dependency::{Collision, DependencyCollection, TaskDependency};
use crate::diagnostics::{NoopObserver, ScheduleObserver};
use crate::error::{Result, ScheduleError};
use crate::graph::{DependencyGraph, ThrowingLoopLogger};
use crate::hierarchy::{ROOT_TASK_ID, TaskHierarchy};
use crate::snapshot::ScheduleSnapshot;
use crate::task::{ResourceAssignment, Task, TaskId};
use crate::time_unit::TimeDuration;

/// Parameters for [`TaskManager::create_task`]. Unset fields fall back to
/// the manager's [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub id: Option<TaskId>,
    pub name: String,
    pub start: Option<NaiveDate>,
    pub duration: Option<TimeDuration>,
    pub milestone: bool,
    pub parent: Option<TaskId>,
    pub index: Option<usize>,
}

impl NewTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn starting(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }

    pub fn lasting(mut self, duration: TimeDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn milestone(mut self) -> Self {
        self.milestone = true;
        self
    }

    pub fn under(mut self, parent: TaskId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// Owns every task, the containment tree, the dependencies and the graph
/// built from them, and keeps the schedule consistent after each edit.
#[derive(Debug)]
pub struct TaskManager {
    tasks: BTreeMap<TaskId, Task>,
    hierarchy: TaskHierarchy,
    dependencies: DependencyCollection,
    graph: DependencyGraph,
    calendar: Arc<dyn Calendar>,
    config: EngineConfig,
    observer: Arc<dyn ScheduleObserver>,
    scheduler_enabled: bool,
    recalculating: bool,
    next_id: TaskId,
}

impl TaskManager {
    pub fn new(calendar: Arc<dyn Calendar>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tasks: BTreeMap::new(),
            hierarchy: TaskHierarchy::new(),
            dependencies: DependencyCollection::new(),
            graph: DependencyGraph::with_loop_logger(Box::new(ThrowingLoopLogger)),
            calendar,
            scheduler_enabled: config.scheduler_enabled,
            config,
            observer: Arc::new(NoopObserver),
            recalculating: false,
            next_id: 0,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScheduleObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn set_observer(&mut self, observer: Arc<dyn ScheduleObserver>) {
        self.observer = observer;
    }

    pub fn calendar(&self) -> &dyn Calendar {
        self.calendar.as_ref()
    }

    /// Swaps the calendar and rebuilds every task's activities against it.
    pub fn set_calendar(&mut self, calendar: Arc<dyn Calendar>) -> Result<()> {
        self.calendar = calendar;
        for task in self.tasks.values_mut() {
            task.shift_to(task.start(), self.calendar.as_ref())?;
        }
        if self.scheduler_enabled {
            self.recalculate_schedule()?;
        }
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn hierarchy(&self) -> &TaskHierarchy {
        &self.hierarchy
    }

    pub fn dependencies(&self) -> &DependencyCollection {
        &self.dependencies
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn is_scheduler_enabled(&self) -> bool {
        self.scheduler_enabled
    }

    /// With the scheduler off, edits only touch the edited task.
    pub fn set_scheduler_enabled(&mut self, enabled: bool) {
        self.scheduler_enabled = enabled;
    }

    pub fn create_task(&mut self, new_task: NewTask) -> Result<TaskId> {
        let parent = new_task.parent.unwrap_or(ROOT_TASK_ID);
        self.ensure_container(parent)?;

        let id = match new_task.id {
            Some(id) if id >= 0 && !self.tasks.contains_key(&id) => id,
            _ => self.allocate_id()?,
        };
        if let Some(after) = id.checked_add(1) {
            self.next_id = self.next_id.max(after);
        }

        let start = new_task.start.unwrap_or(self.config.default_start);
        let duration = new_task.duration.unwrap_or(self.config.default_duration);
        let mut task = Task::new(id, new_task.name, start, duration, self.calendar.as_ref())?;
        if new_task.milestone {
            task.set_milestone(true, self.calendar.as_ref())?;
        }

        self.tasks.insert(id, task);
        self.hierarchy.insert(id, parent, new_task.index);
        self.graph.add_task(id);
        if parent != ROOT_TASK_ID {
            self.graph.move_task(id, Some(parent))?;
        }
        tracing::debug!(task = id, parent, "task created");

        if parent != ROOT_TASK_ID {
            self.reschedule_from(&[id])?;
        }
        Ok(id)
    }

    /// Re-parents `task` under `new_parent` (`None` for the root). A move that
    /// would close a loop fails with `MoveCycle` and changes nothing.
    pub fn move_task(
        &mut self,
        task: TaskId,
        new_parent: Option<TaskId>,
        index: Option<usize>,
    ) -> Result<()> {
        self.ensure_task(task)?;
        let parent = new_parent.unwrap_or(ROOT_TASK_ID);
        self.ensure_container(parent)?;
        if parent == task || self.hierarchy.is_ancestor(task, parent) {
            return Err(ScheduleError::MoveCycle { task, parent });
        }

        self.graph.start_transaction()?;
        let graph_parent = (parent != ROOT_TASK_ID).then_some(parent);
        if let Err(err) = self.graph.move_task(task, graph_parent) {
            self.graph.rollback_transaction();
            return Err(match err {
                ScheduleError::Cycle { .. } => ScheduleError::MoveCycle { task, parent },
                other => other,
            });
        }
        self.graph.commit_transaction();

        let old_parent = self.hierarchy.move_to(task, parent, index);
        let mut changed = vec![task];
        changed.extend(self.hierarchy.deep_nested_tasks(task));
        if let Some((old_parent, _)) = old_parent {
            if old_parent != ROOT_TASK_ID {
                changed.push(old_parent);
            }
        }
        self.reschedule_from(&changed)
    }

    /// Deletes `task`, its subtree and every dependency touching them.
    pub fn delete_task(&mut self, task: TaskId) -> Result<()> {
        self.ensure_task(task)?;
        let parent = self.hierarchy.container_of(task);

        let mut doomed = vec![task];
        doomed.extend(self.hierarchy.deep_nested_tasks(task));
        for id in doomed.into_iter().rev() {
            for dependency in self.dependencies.touching(id) {
                self.dependencies
                    .remove(dependency.dependant, dependency.dependee);
                self.graph
                    .remove_dependency(dependency.dependee, dependency.dependant);
            }
            self.graph.remove_task(id);
            self.hierarchy.remove(id);
            self.tasks.remove(&id);
        }
        tracing::debug!(task, "task deleted");

        match parent {
            Some(parent) if parent != ROOT_TASK_ID => self.reschedule_from(&[parent]),
            _ => Ok(()),
        }
    }

    pub fn container_of(&self, task: TaskId) -> Option<TaskId> {
        self.hierarchy.container_of(task)
    }

    pub fn nested_tasks(&self, task: TaskId) -> &[TaskId] {
        self.hierarchy.nested_tasks(task)
    }

    pub fn deep_nested_tasks(&self, task: TaskId) -> Vec<TaskId> {
        self.hierarchy.deep_nested_tasks(task)
    }

    /// Dependency carrying the configured default constraint and hardness.
    pub fn new_dependency(&self, dependant: TaskId, dependee: TaskId) -> TaskDependency {
        TaskDependency::new(dependant, dependee)
            .with_constraint(self.config.default_constraint)
            .with_hardness(self.config.default_hardness)
    }

    pub fn create_dependency(&mut self, dependency: TaskDependency) -> Result<()> {
        let (dependant, dependee) = (dependency.dependant, dependency.dependee);
        self.dependencies
            .validate_new(dependant, dependee, &self.hierarchy)?;

        self.graph.start_transaction()?;
        if let Err(err) = self.graph.add_dependency(dependee, dependant) {
            self.graph.rollback_transaction();
            return Err(match err {
                ScheduleError::Cycle { .. } => ScheduleError::Cycle {
                    dependant,
                    dependee,
                },
                other => other,
            });
        }
        self.graph.commit_transaction();
        self.dependencies.insert(dependency)?;
        tracing::debug!(dependant, dependee, "dependency created");

        self.reschedule_from(&[dependee])
    }

    /// Whether `dependant` may depend on `dependee`; leaves the graph untouched.
    pub fn can_create_dependency(&mut self, dependant: TaskId, dependee: TaskId) -> bool {
        if self
            .dependencies
            .validate_new(dependant, dependee, &self.hierarchy)
            .is_err()
        {
            return false;
        }
        if self.graph.start_transaction().is_err() {
            return false;
        }
        let feasible = self.graph.add_dependency(dependee, dependant).is_ok();
        self.graph.rollback_transaction();
        feasible
    }

    pub fn delete_dependency(
        &mut self,
        dependant: TaskId,
        dependee: TaskId,
    ) -> Result<Option<TaskDependency>> {
        let Some(removed) = self.dependencies.remove(dependant, dependee) else {
            return Ok(None);
        };
        self.graph.remove_dependency(dependee, dependant);
        self.reschedule_from(&[dependant])?;
        Ok(Some(removed))
    }

    /// Replaces constraint, lag and hardness of an existing dependency.
    pub fn update_dependency(&mut self, dependency: TaskDependency) -> Result<()> {
        let (dependant, dependee) = dependency.key();
        if self.dependencies.update(dependency).is_none() {
            return Err(ScheduleError::InvalidReference(dependant));
        }
        self.reschedule_from(&[dependee])
    }

    /// Checks a dependency against the current dates without moving anything.
    pub fn collision_of(&self, dependant: TaskId, dependee: TaskId) -> Option<Collision> {
        let dependency = self.dependencies.get(dependant, dependee)?;
        let dependee = self.tasks.get(&dependee)?;
        let dependant = self.tasks.get(&dependant)?;
        Some(dependency.collision(dependee, dependant, self.calendar.as_ref()))
    }

    /// Moves the task to `start`, keeping its duration.
    pub fn set_start(&mut self, task: TaskId, start: NaiveDate) -> Result<()> {
        let calendar = Arc::clone(&self.calendar);
        self.task_mut(task)?.shift_to(start, calendar.as_ref())?;
        self.reschedule_from(&[task])
    }

    pub fn set_end(&mut self, task: TaskId, end: NaiveDate) -> Result<()> {
        let calendar = Arc::clone(&self.calendar);
        self.task_mut(task)?.set_end(end, calendar.as_ref())?;
        self.reschedule_from(&[task])
    }

    pub fn set_duration(&mut self, task: TaskId, duration: TimeDuration) -> Result<()> {
        let calendar = Arc::clone(&self.calendar);
        self.task_mut(task)?
            .set_duration(duration, calendar.as_ref())?;
        self.reschedule_from(&[task])
    }

    pub fn set_milestone(&mut self, task: TaskId, milestone: bool) -> Result<()> {
        let calendar = Arc::clone(&self.calendar);
        self.task_mut(task)?
            .set_milestone(milestone, calendar.as_ref())?;
        self.reschedule_from(&[task])
    }

    pub fn shift_task(&mut self, task: TaskId, offset: TimeDuration) -> Result<()> {
        let calendar = Arc::clone(&self.calendar);
        self.task_mut(task)?.shift_by(offset, calendar.as_ref())?;
        self.reschedule_from(&[task])
    }

    pub fn set_earliest_start(&mut self, task: TaskId, date: Option<NaiveDate>) -> Result<()> {
        self.task_mut(task)?.set_earliest_start(date);
        self.reschedule_from(&[task])
    }

    pub fn set_completion(&mut self, task: TaskId, completion: u8) -> Result<()> {
        self.task_mut(task)?.set_completion(completion)
    }

    pub fn rename_task(&mut self, task: TaskId, name: impl Into<String>) -> Result<()> {
        self.task_mut(task)?.name = name.into();
        Ok(())
    }

    pub fn add_assignment(&mut self, task: TaskId, assignment: ResourceAssignment) -> Result<()> {
        self.task_mut(task)?.add_assignment(assignment);
        Ok(())
    }

    /// Drops `resource_id` from every task; returns how many tasks lost it.
    pub fn remove_resource(&mut self, resource_id: i32) -> usize {
        self.tasks
            .values_mut()
            .map(|task| task.remove_assignment(resource_id))
            .filter(|removed| *removed)
            .count()
    }

    pub fn assignments_of(&self, resource_id: i32) -> Vec<(TaskId, &ResourceAssignment)> {
        self.tasks
            .values()
            .flat_map(|task| {
                task.assignments()
                    .iter()
                    .filter(move |assignment| assignment.resource_id == resource_id)
                    .map(move |assignment| (task.id, assignment))
            })
            .collect()
    }

    pub fn project_start(&self) -> Option<NaiveDate> {
        self.tasks.values().map(Task::start).min()
    }

    pub fn project_end(&self) -> Option<NaiveDate> {
        self.tasks.values().map(Task::end).max()
    }

    /// Copies `other`'s tasks and dependencies under `target` (`None` for the
    /// root). Source IDs are kept whenever they are free here.
    /// Returns the source to destination ID map.
    pub fn import_from(
        &mut self,
        other: &TaskManager,
        target: Option<TaskId>,
    ) -> Result<HashMap<TaskId, TaskId>> {
        let target = target.unwrap_or(ROOT_TASK_ID);
        self.ensure_container(target)?;

        let enabled = std::mem::replace(&mut self.scheduler_enabled, false);
        let imported = self.import_tasks(other, target);
        self.scheduler_enabled = enabled;
        let id_map = imported?;

        if self.scheduler_enabled {
            self.recalculate_schedule()?;
        }
        tracing::debug!(tasks = id_map.len(), target, "import finished");
        Ok(id_map)
    }

    fn import_tasks(
        &mut self,
        other: &TaskManager,
        target: TaskId,
    ) -> Result<HashMap<TaskId, TaskId>> {
        let mut id_map = HashMap::new();
        for source_id in other.hierarchy.document_order() {
            let Some(source) = other.tasks.get(&source_id) else {
                continue;
            };
            let parent = match other.hierarchy.container_of(source_id) {
                Some(ROOT_TASK_ID) | None => target,
                Some(parent) => *id_map
                    .get(&parent)
                    .ok_or(ScheduleError::InvalidReference(parent))?,
            };

            let mut new_task = NewTask::new(source.name.clone())
                .with_id(source_id)
                .starting(source.start())
                .lasting(source.duration());
            new_task.milestone = source.is_milestone();
            new_task.parent = (parent != ROOT_TASK_ID).then_some(parent);
            let id = self.create_task(new_task)?;

            let task = self.task_mut(id)?;
            task.notes = source.notes.clone();
            task.set_completion(source.completion())?;
            task.set_earliest_start(source.earliest_start());
            for assignment in source.assignments() {
                task.add_assignment(assignment.clone());
            }
            id_map.insert(source_id, id);
        }

        for dependency in other.dependencies.iter() {
            let (Some(&dependant), Some(&dependee)) = (
                id_map.get(&dependency.dependant),
                id_map.get(&dependency.dependee),
            ) else {
                continue;
            };
            self.create_dependency(TaskDependency {
                dependant,
                dependee,
                ..dependency.clone()
            })?;
        }
        Ok(id_map)
    }

    /// Full forward pass over every task, whatever the scheduler flag says.
    pub fn recalculate_schedule(&mut self) -> Result<BTreeSet<TaskId>> {
        self.run_scheduler(None)
    }

    /// Fits supertasks around their children. `None` refits every container.
    pub fn adjust_bounds(&mut self, scope: Option<TaskId>) -> Result<BTreeSet<TaskId>> {
        let supertasks: Vec<TaskId> = match scope {
            Some(task) => {
                self.ensure_task(task)?;
                vec![task]
            }
            None => self
                .tasks
                .keys()
                .copied()
                .filter(|id| self.hierarchy.has_nested_tasks(*id))
                .collect(),
        };
        AdjustBounds::new(&self.hierarchy, self.calendar.as_ref(), self.observer.as_ref())
            .run(&mut self.tasks, &supertasks)
    }

    /// Pulls children that stick out of `supertask` back inside and
    /// reschedules from the ones that moved.
    pub fn adjust_nested_tasks(&mut self, supertask: TaskId) -> Result<Vec<TaskId>> {
        self.ensure_task(supertask)?;
        let moved = AdjustBounds::new(&self.hierarchy, self.calendar.as_ref(), self.observer.as_ref())
            .adjust_nested_tasks(&mut self.tasks, supertask)?;
        if !moved.is_empty() {
            self.run_scheduler(Some(&moved))?;
        }
        Ok(moved)
    }

    /// Rolls completion up into `scope` and its ancestors, or into every
    /// container when `scope` is `None`. Returns how many containers changed.
    pub fn recalculate_completion(&mut self, scope: Option<TaskId>) -> Result<usize> {
        let aggregator = CompletionAggregator::new(&self.hierarchy, self.calendar.as_ref());
        let Some(container) = scope else {
            return aggregator.run_all(&mut self.tasks);
        };
        if !self.tasks.contains_key(&container) {
            return Err(ScheduleError::InvalidReference(container));
        }
        let mut updated = 0;
        for id in std::iter::once(container).chain(self.hierarchy.ancestors(container)) {
            if aggregator.run(&mut self.tasks, id)? {
                updated += 1;
            }
        }
        Ok(updated)
    }

    pub fn critical_tasks(&self, scope: CriticalScope) -> Result<BTreeSet<TaskId>> {
        CriticalPath::new(&self.hierarchy, &self.dependencies, self.calendar.as_ref())
            .critical_tasks(&self.tasks, scope)
    }

    /// Stores the project-wide critical flag on every task.
    pub fn mark_critical_tasks(&mut self) -> Result<BTreeSet<TaskId>> {
        let critical = self.critical_tasks(CriticalScope::Project)?;
        for (id, task) in self.tasks.iter_mut() {
            task.set_critical(critical.contains(id));
        }
        Ok(critical)
    }

    /// Immutable copy of the schedule for consumers that must not hold a lock.
    pub fn snapshot(&self) -> ScheduleSnapshot {
        let tasks = self
            .hierarchy
            .document_order()
            .into_iter()
            .filter_map(|id| self.tasks.get(&id).cloned())
            .collect();
        let parents = self
            .tasks
            .keys()
            .filter_map(|id| {
                self.hierarchy
                    .container_of(*id)
                    .filter(|parent| *parent != ROOT_TASK_ID)
                    .map(|parent| (*id, parent))
            })
            .collect();
        ScheduleSnapshot {
            tasks,
            parents,
            dependencies: self.dependencies.iter().cloned().collect(),
            project_start: self.project_start(),
            project_end: self.project_end(),
        }
    }

    /// Lowest free ID at or above `next_id`.
    fn allocate_id(&mut self) -> Result<TaskId> {
        while self.tasks.contains_key(&self.next_id) {
            self.next_id = self
                .next_id
                .checked_add(1)
                .ok_or(ScheduleError::IdSpaceExhausted(self.next_id))?;
        }
        Ok(self.next_id)
    }

    fn reschedule_from(&mut self, changed: &[TaskId]) -> Result<()> {
        if self.scheduler_enabled {
            self.run_scheduler(Some(changed))?;
        }
        Ok(())
    }

    fn run_scheduler(&mut self, changed: Option<&[TaskId]>) -> Result<BTreeSet<TaskId>> {
        if self.recalculating {
            tracing::debug!("schedule recalculation already running, nested run skipped");
            return Ok(BTreeSet::new());
        }
        self.recalculating = true;
        let scheduler = Scheduler::new(
            &self.graph,
            &self.dependencies,
            self.calendar.as_ref(),
            self.observer.as_ref(),
        );
        let result = match changed {
            Some(changed) => scheduler.run_from(&mut self.tasks, changed),
            None => scheduler.run(&mut self.tasks),
        };
        self.recalculating = false;
        result
    }

    fn task_mut(&mut self, task: TaskId) -> Result<&mut Task> {
        self.tasks
            .get_mut(&task)
            .ok_or(ScheduleError::InvalidReference(task))
    }

    fn ensure_task(&self, task: TaskId) -> Result<()> {
        if self.tasks.contains_key(&task) {
            Ok(())
        } else {
            Err(ScheduleError::InvalidReference(task))
        }
    }

    fn ensure_container(&self, container: TaskId) -> Result<()> {
        if container == ROOT_TASK_ID {
            Ok(())
        } else {
            self.ensure_task(container)
        }
    }
}
