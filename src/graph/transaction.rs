use super::{DependencyGraph, GraphEdge, NodeData};
use crate::error::{Result, ScheduleError};
use crate::task::TaskId;

/// One reversible change to the graph.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UndoRecord {
    NodeAdded(TaskId),
    NodeRemoved { node: TaskId, level: usize },
    EdgeAdded(GraphEdge),
    EdgeRemoved(GraphEdge),
    LevelChanged { node: TaskId, old: usize },
}

impl DependencyGraph {
    pub fn start_transaction(&mut self) -> Result<()> {
        if self.undo.is_some() {
            return Err(ScheduleError::Transaction(
                "a transaction is already active".into(),
            ));
        }
        self.undo = Some(Vec::new());
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.undo.is_some()
    }

    /// Keeps every change made since `start_transaction`.
    pub fn commit_transaction(&mut self) {
        self.undo = None;
    }

    /// Replays the undo log in reverse, restoring the state at `start_transaction`.
    pub fn rollback_transaction(&mut self) {
        let Some(log) = self.undo.take() else {
            return;
        };
        tracing::debug!(records = log.len(), "rolling back dependency graph transaction");
        for record in log.into_iter().rev() {
            match record {
                UndoRecord::NodeAdded(node) => {
                    self.nodes.remove(&node);
                }
                UndoRecord::NodeRemoved { node, level } => {
                    self.nodes.insert(
                        node,
                        NodeData {
                            level,
                            ..NodeData::default()
                        },
                    );
                }
                UndoRecord::EdgeAdded(edge) => self.unlink(&edge),
                UndoRecord::EdgeRemoved(edge) => self.link(edge),
                UndoRecord::LevelChanged { node, old } => {
                    if let Some(data) = self.nodes.get_mut(&node) {
                        data.level = old;
                    }
                }
            }
        }
    }

    pub(super) fn record(&mut self, record: UndoRecord) {
        if let Some(log) = self.undo.as_mut() {
            log.push(record);
        }
    }
}
