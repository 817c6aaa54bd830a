//! Structural view of the schedule: precedence edges plus the orderings
//! implied by containment, arranged in levels for layer-by-layer scheduling.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::mem;

use crate::error::{Result, ScheduleError};
use crate::task::TaskId;

pub mod loop_logger;
pub mod transaction;

pub use loop_logger::{LoopLogger, ThrowingLoopLogger, TracingLoopLogger};
use transaction::UndoRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// A user dependency, dependee -> dependant.
    Explicit,
    /// Subtask -> supertask; a supertask is scheduled after its subtasks.
    SubSuper,
    /// Copy of an explicit edge into `supertask` onto one of its subtasks.
    Inherited { supertask: TaskId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphEdge {
    pub src: TaskId,
    pub dst: TaskId,
    pub kind: EdgeKind,
}

impl GraphEdge {
    pub fn explicit(dependee: TaskId, dependant: TaskId) -> Self {
        Self {
            src: dependee,
            dst: dependant,
            kind: EdgeKind::Explicit,
        }
    }

    pub fn sub_super(subtask: TaskId, supertask: TaskId) -> Self {
        Self {
            src: subtask,
            dst: supertask,
            kind: EdgeKind::SubSuper,
        }
    }

    pub fn inherited(dependee: TaskId, subtask: TaskId, supertask: TaskId) -> Self {
        Self {
            src: dependee,
            dst: subtask,
            kind: EdgeKind::Inherited { supertask },
        }
    }

    /// Inherited edges never pin their target.
    pub fn is_weak(&self) -> bool {
        matches!(self.kind, EdgeKind::Inherited { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct NodeData {
    level: usize,
    incoming: Vec<GraphEdge>,
    outgoing: Vec<GraphEdge>,
}

#[derive(Debug)]
pub struct DependencyGraph {
    nodes: BTreeMap<TaskId, NodeData>,
    undo: Option<Vec<UndoRecord>>,
    loop_logger: Box<dyn LoopLogger>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DependencyGraph {
    /// Clones the structure; the copy starts outside any transaction and
    /// reports loops with the throwing logger.
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            undo: None,
            loop_logger: Box::new(ThrowingLoopLogger),
        }
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::with_loop_logger(Box::new(TracingLoopLogger))
    }

    pub fn with_loop_logger(loop_logger: Box<dyn LoopLogger>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            undo: None,
            loop_logger,
        }
    }

    /// Installs a new loop logger and hands back the previous one.
    pub fn set_loop_logger(&mut self, loop_logger: Box<dyn LoopLogger>) -> Box<dyn LoopLogger> {
        mem::replace(&mut self.loop_logger, loop_logger)
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.nodes.contains_key(&task)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn level(&self, task: TaskId) -> Option<usize> {
        self.nodes.get(&task).map(|node| node.level)
    }

    pub fn incoming(&self, task: TaskId) -> &[GraphEdge] {
        self.nodes
            .get(&task)
            .map(|node| node.incoming.as_slice())
            .unwrap_or(&[])
    }

    pub fn outgoing(&self, task: TaskId) -> &[GraphEdge] {
        self.nodes
            .get(&task)
            .map(|node| node.outgoing.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks grouped by level, lowest first; IDs ascending within a layer.
    pub fn layers(&self) -> Vec<Vec<TaskId>> {
        let mut layers: Vec<Vec<TaskId>> = Vec::new();
        for (id, node) in &self.nodes {
            if layers.len() <= node.level {
                layers.resize_with(node.level + 1, Vec::new);
            }
            layers[node.level].push(*id);
        }
        layers.retain(|layer| !layer.is_empty());
        layers
    }

    pub fn supertask(&self, task: TaskId) -> Option<TaskId> {
        self.outgoing(task)
            .iter()
            .find(|edge| edge.kind == EdgeKind::SubSuper)
            .map(|edge| edge.dst)
    }

    pub fn subtasks(&self, task: TaskId) -> Vec<TaskId> {
        self.incoming(task)
            .iter()
            .filter(|edge| edge.kind == EdgeKind::SubSuper)
            .map(|edge| edge.src)
            .collect()
    }

    fn deep_subtasks(&self, task: TaskId) -> Vec<TaskId> {
        let mut result = Vec::new();
        let mut stack = self.subtasks(task);
        while let Some(next) = stack.pop() {
            stack.extend(self.subtasks(next));
            result.push(next);
        }
        result
    }

    fn supertask_chain(&self, task: TaskId) -> Vec<TaskId> {
        let mut result = Vec::new();
        let mut current = self.supertask(task);
        while let Some(parent) = current {
            result.push(parent);
            current = self.supertask(parent);
        }
        result
    }

    pub fn add_task(&mut self, task: TaskId) {
        if self.nodes.contains_key(&task) {
            return;
        }
        self.nodes.insert(task, NodeData::default());
        self.record(UndoRecord::NodeAdded(task));
    }

    /// Removes the node and every edge touching it.
    pub fn remove_task(&mut self, task: TaskId) {
        let Some(node) = self.nodes.get(&task) else {
            return;
        };
        let edges: Vec<GraphEdge> = node
            .incoming
            .iter()
            .chain(node.outgoing.iter())
            .copied()
            .collect();
        for edge in edges {
            self.remove_edge(&edge);
        }
        if let Some(node) = self.nodes.remove(&task) {
            self.record(UndoRecord::NodeRemoved {
                node: task,
                level: node.level,
            });
        }
    }

    /// Adds `dependee -> dependant` and its inherited copies on the dependant's subtasks.
    pub fn add_dependency(&mut self, dependee: TaskId, dependant: TaskId) -> Result<()> {
        self.add_edge(GraphEdge::explicit(dependee, dependant))?;
        for subtask in self.deep_subtasks(dependant) {
            self.add_edge(GraphEdge::inherited(dependee, subtask, dependant))?;
        }
        Ok(())
    }

    pub fn remove_dependency(&mut self, dependee: TaskId, dependant: TaskId) {
        self.remove_edge(&GraphEdge::explicit(dependee, dependant));
        for subtask in self.deep_subtasks(dependant) {
            self.remove_edge(&GraphEdge::inherited(dependee, subtask, dependant));
        }
    }

    /// Re-attaches `task` under `new_parent` (`None` for the root), replacing
    /// the implicit edges of its subtree.
    pub fn move_task(&mut self, task: TaskId, new_parent: Option<TaskId>) -> Result<()> {
        if !self.contains(task) {
            return Err(ScheduleError::InvalidReference(task));
        }
        let old_ancestors: HashSet<TaskId> = self.supertask_chain(task).into_iter().collect();
        let mut subtree = vec![task];
        subtree.extend(self.deep_subtasks(task));

        if let Some(old_parent) = self.supertask(task) {
            self.remove_edge(&GraphEdge::sub_super(task, old_parent));
        }
        for member in &subtree {
            let stale: Vec<GraphEdge> = self
                .incoming(*member)
                .iter()
                .filter(|edge| match edge.kind {
                    EdgeKind::Inherited { supertask } => old_ancestors.contains(&supertask),
                    _ => false,
                })
                .copied()
                .collect();
            for edge in stale {
                self.remove_edge(&edge);
            }
        }

        let Some(parent) = new_parent else {
            return Ok(());
        };
        self.add_edge(GraphEdge::sub_super(task, parent))?;

        let mut ancestors = vec![parent];
        ancestors.extend(self.supertask_chain(parent));
        for ancestor in ancestors {
            let explicit: Vec<TaskId> = self
                .incoming(ancestor)
                .iter()
                .filter(|edge| edge.kind == EdgeKind::Explicit)
                .map(|edge| edge.src)
                .collect();
            for dependee in explicit {
                for member in &subtree {
                    self.add_edge(GraphEdge::inherited(dependee, *member, ancestor))?;
                }
            }
        }
        Ok(())
    }

    /// Inserts an edge unless it closes a loop, in which case the loop logger decides.
    /// Returns whether the edge was inserted.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<bool> {
        for id in [edge.src, edge.dst] {
            if !self.contains(id) {
                return Err(ScheduleError::InvalidReference(id));
            }
        }
        if self.reaches(edge.dst, edge.src) {
            self.loop_logger.dependency_loop(&edge)?;
            return Ok(false);
        }
        self.link(edge);
        self.record(UndoRecord::EdgeAdded(edge));

        let candidate = self.level(edge.src).unwrap_or(0) + 1;
        if self.level(edge.dst).unwrap_or(0) < candidate {
            self.set_level(edge.dst, candidate);
            self.promote(edge.dst);
        }
        Ok(true)
    }

    pub fn remove_edge(&mut self, edge: &GraphEdge) {
        let present = self
            .nodes
            .get(&edge.dst)
            .is_some_and(|node| node.incoming.contains(edge));
        if !present {
            return;
        }
        self.unlink(edge);
        self.record(UndoRecord::EdgeRemoved(*edge));
        self.demote(edge.dst);
    }

    /// True if `to` can be reached from `from` following outgoing edges.
    fn reaches(&self, from: TaskId, to: TaskId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.outgoing(current).iter().map(|edge| edge.dst));
        }
        false
    }

    fn promote(&mut self, start: TaskId) {
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let next_level = self.level(current).unwrap_or(0) + 1;
            let targets: Vec<TaskId> = self.outgoing(current).iter().map(|edge| edge.dst).collect();
            for target in targets {
                if self.level(target).unwrap_or(0) < next_level {
                    self.set_level(target, next_level);
                    queue.push_back(target);
                }
            }
        }
    }

    fn demote(&mut self, start: TaskId) {
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let expected = self
                .incoming(current)
                .iter()
                .filter_map(|edge| self.level(edge.src))
                .map(|level| level + 1)
                .max()
                .unwrap_or(0);
            if self.level(current).is_some_and(|level| level > expected) {
                self.set_level(current, expected);
                queue.extend(self.outgoing(current).iter().map(|edge| edge.dst));
            }
        }
    }

    fn set_level(&mut self, task: TaskId, level: usize) {
        let Some(node) = self.nodes.get_mut(&task) else {
            return;
        };
        let old = mem::replace(&mut node.level, level);
        if old != level {
            self.record(UndoRecord::LevelChanged { node: task, old });
        }
    }

    fn link(&mut self, edge: GraphEdge) {
        if let Some(src) = self.nodes.get_mut(&edge.src) {
            src.outgoing.push(edge);
        }
        if let Some(dst) = self.nodes.get_mut(&edge.dst) {
            dst.incoming.push(edge);
        }
    }

    fn unlink(&mut self, edge: &GraphEdge) {
        if let Some(src) = self.nodes.get_mut(&edge.src) {
            if let Some(pos) = src.outgoing.iter().position(|e| e == edge) {
                src.outgoing.remove(pos);
            }
        }
        if let Some(dst) = self.nodes.get_mut(&edge.dst) {
            if let Some(pos) = dst.incoming.iter().position(|e| e == edge) {
                dst.incoming.remove(pos);
            }
        }
    }
}
