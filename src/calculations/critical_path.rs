use chrono::NaiveDate;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::calendar::Calendar;
use crate::dependency::DependencyCollection;
use crate::error::{Result, ScheduleError};
use crate::hierarchy::TaskHierarchy;
use crate::task::{Task, TaskId};
use crate::time_unit::TimeDuration;

/// Which tasks a critical path is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CriticalScope {
    #[default]
    Project,
    /// Descendants of the given supertask, against its own bounds.
    Subtree(TaskId),
}

pub struct CriticalPath<'a> {
    hierarchy: &'a TaskHierarchy,
    dependencies: &'a DependencyCollection,
    calendar: &'a dyn Calendar,
}

impl<'a> CriticalPath<'a> {
    pub fn new(
        hierarchy: &'a TaskHierarchy,
        dependencies: &'a DependencyCollection,
        calendar: &'a dyn Calendar,
    ) -> Self {
        Self {
            hierarchy,
            dependencies,
            calendar,
        }
    }

    /// Tasks with zero slack within `scope`.
    pub fn critical_tasks(
        &self,
        tasks: &BTreeMap<TaskId, Task>,
        scope: CriticalScope,
    ) -> Result<BTreeSet<TaskId>> {
        let (members, deadline) = match scope {
            CriticalScope::Project => (
                tasks.keys().copied().collect::<Vec<_>>(),
                tasks.values().map(Task::end).max(),
            ),
            CriticalScope::Subtree(root) => {
                let root_task = tasks
                    .get(&root)
                    .ok_or(ScheduleError::InvalidReference(root))?;
                let members = self.hierarchy.deep_nested_tasks(root);
                let deadline = members
                    .iter()
                    .filter_map(|id| tasks.get(id))
                    .map(Task::end)
                    .chain(std::iter::once(root_task.end()))
                    .max();
                (members, deadline)
            }
        };
        let Some(deadline) = deadline else {
            return Ok(BTreeSet::new());
        };
        let in_scope: HashSet<TaskId> = members
            .iter()
            .copied()
            .filter(|id| tasks.contains_key(id))
            .collect();

        // Edges point from a task to whatever constrains its latest finish.
        let mut graph: DiGraph<TaskId, ()> = DiGraph::new();
        let mut index: HashMap<TaskId, NodeIndex> = HashMap::new();
        for id in &members {
            if in_scope.contains(id) {
                index.insert(*id, graph.add_node(*id));
            }
        }
        for dependency in self.dependencies.iter() {
            if let (Some(&from), Some(&to)) = (
                index.get(&dependency.dependee),
                index.get(&dependency.dependant),
            ) {
                graph.add_edge(from, to, ());
            }
        }
        for id in &members {
            if let (Some(&child), Some(parent)) = (index.get(id), self.hierarchy.container_of(*id))
            {
                if let Some(&parent) = index.get(&parent) {
                    graph.add_edge(child, parent, ());
                }
            }
        }

        let mut order = toposort(&graph, None).map_err(|cycle| {
            let task = graph[cycle.node_id()];
            ScheduleError::Cycle {
                dependant: task,
                dependee: task,
            }
        })?;
        order.reverse();

        let mut latest_starts: HashMap<TaskId, NaiveDate> = HashMap::new();
        let mut inherited_finish: HashMap<TaskId, NaiveDate> = HashMap::new();
        let mut critical = BTreeSet::new();

        for node in order {
            let task_id = graph[node];
            let Some(task) = tasks.get(&task_id) else {
                continue;
            };

            let mut latest_finish = inherited_finish.get(&task_id).copied();
            for dependency in self.dependencies.as_dependee(task_id) {
                if !in_scope.contains(&dependency.dependant) {
                    continue;
                }
                let (Some(dependant), Some(&dependant_start)) = (
                    tasks.get(&dependency.dependant),
                    latest_starts.get(&dependency.dependant),
                ) else {
                    continue;
                };
                let bound =
                    dependency.backward_collision(task, dependant, dependant_start, self.calendar);
                latest_finish = Some(latest_finish.map_or(bound, |current| current.min(bound)));
            }
            let latest_finish = latest_finish.map_or(deadline, |date| date.min(deadline));
            let latest_start = self.calendar.shift_date(
                latest_finish,
                TimeDuration::days(-task.duration_in_days(self.calendar)),
            );
            latest_starts.insert(task_id, latest_start);

            // Starts on non-working days count from the next working day.
            let scheduled_start = self.calendar.find_closest_working_time(task.start());
            if self.calendar.find_closest_working_time(latest_start) == scheduled_start {
                critical.insert(task_id);
                for child in self.hierarchy.nested_tasks(task_id) {
                    if in_scope.contains(child) {
                        inherited_finish.insert(*child, latest_finish);
                    }
                }
            }
        }

        tracing::debug!(?scope, critical = critical.len(), "critical path computed");
        Ok(critical)
    }
}
