use std::collections::HashMap;

use crate::task::TaskId;

/// Identifier of the invisible root that owns all top-level tasks.
pub const ROOT_TASK_ID: TaskId = -1;

/// Containment tree stored as parent/children index maps.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHierarchy {
    parents: HashMap<TaskId, TaskId>,
    children: HashMap<TaskId, Vec<TaskId>>,
}

impl Default for TaskHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskHierarchy {
    pub fn new() -> Self {
        Self {
            parents: HashMap::new(),
            children: HashMap::from([(ROOT_TASK_ID, Vec::new())]),
        }
    }

    pub fn root(&self) -> TaskId {
        ROOT_TASK_ID
    }

    pub fn contains(&self, task: TaskId) -> bool {
        task == ROOT_TASK_ID || self.parents.contains_key(&task)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Inserts `task` under `parent` at `index` (appended when `None` or past the end).
    pub(crate) fn insert(&mut self, task: TaskId, parent: TaskId, index: Option<usize>) {
        self.parents.insert(task, parent);
        self.children.entry(task).or_default();
        let siblings = self.children.entry(parent).or_default();
        let at = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, task);
    }

    /// Detaches a task with no children left. Returns its former position.
    pub(crate) fn remove(&mut self, task: TaskId) -> Option<(TaskId, usize)> {
        let parent = self.parents.remove(&task)?;
        self.children.remove(&task);
        let siblings = self.children.get_mut(&parent)?;
        let index = siblings.iter().position(|id| *id == task)?;
        siblings.remove(index);
        Some((parent, index))
    }

    /// Re-parents `task`, returning its former position.
    pub(crate) fn move_to(
        &mut self,
        task: TaskId,
        parent: TaskId,
        index: Option<usize>,
    ) -> Option<(TaskId, usize)> {
        let old_parent = *self.parents.get(&task)?;
        let siblings = self.children.get_mut(&old_parent)?;
        let old_index = siblings.iter().position(|id| *id == task)?;
        siblings.remove(old_index);

        self.parents.insert(task, parent);
        let siblings = self.children.entry(parent).or_default();
        let at = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, task);
        Some((old_parent, old_index))
    }

    pub fn container_of(&self, task: TaskId) -> Option<TaskId> {
        self.parents.get(&task).copied()
    }

    pub fn nested_tasks(&self, task: TaskId) -> &[TaskId] {
        self.children.get(&task).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_nested_tasks(&self, task: TaskId) -> bool {
        !self.nested_tasks(task).is_empty()
    }

    /// All descendants of `task` in document order.
    pub fn deep_nested_tasks(&self, task: TaskId) -> Vec<TaskId> {
        let mut result = Vec::new();
        self.collect_preorder(task, &mut result);
        result
    }

    fn collect_preorder(&self, task: TaskId, out: &mut Vec<TaskId>) {
        for child in self.nested_tasks(task) {
            out.push(*child);
            self.collect_preorder(*child, out);
        }
    }

    pub fn index_of(&self, task: TaskId) -> Option<usize> {
        let parent = self.container_of(task)?;
        self.nested_tasks(parent).iter().position(|id| *id == task)
    }

    pub fn previous_sibling(&self, task: TaskId) -> Option<TaskId> {
        let parent = self.container_of(task)?;
        let index = self.index_of(task)?;
        index
            .checked_sub(1)
            .map(|prev| self.nested_tasks(parent)[prev])
    }

    /// Number of containers between `task` and the root; top-level tasks have depth 1.
    pub fn depth(&self, task: TaskId) -> usize {
        let mut depth = 0;
        let mut current = task;
        while let Some(parent) = self.container_of(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// True if `ancestor` lies on the path from `task` to the root.
    pub fn is_ancestor(&self, ancestor: TaskId, task: TaskId) -> bool {
        let mut current = self.container_of(task);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.container_of(parent);
        }
        false
    }

    pub fn are_unrelated(&self, first: TaskId, second: TaskId) -> bool {
        first != second && !self.is_ancestor(first, second) && !self.is_ancestor(second, first)
    }

    /// Every task below the root in document order.
    pub fn document_order(&self) -> Vec<TaskId> {
        self.deep_nested_tasks(ROOT_TASK_ID)
    }

    /// Ancestors of `task` from its container up to, excluding, the root.
    pub fn ancestors(&self, task: TaskId) -> Vec<TaskId> {
        let mut result = Vec::new();
        let mut current = self.container_of(task);
        while let Some(parent) = current {
            if parent == ROOT_TASK_ID {
                break;
            }
            result.push(parent);
            current = self.container_of(parent);
        }
        result
    }
}
