use std::fmt;

use super::GraphEdge;
use crate::error::{Result, ScheduleError};

/// Decides what happens when an edge would close a loop.
///
/// Returning `Ok(())` skips the offending edge and lets the mutation go on;
/// returning an error aborts it.
pub trait LoopLogger: fmt::Debug + Send + Sync {
    fn dependency_loop(&self, edge: &GraphEdge) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLoopLogger;

impl LoopLogger for TracingLoopLogger {
    fn dependency_loop(&self, edge: &GraphEdge) -> Result<()> {
        tracing::warn!(
            src = edge.src,
            dst = edge.dst,
            kind = ?edge.kind,
            "dependency loop detected, edge ignored"
        );
        Ok(())
    }
}

/// Fails on the first loop; used for feasibility checks inside a transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrowingLoopLogger;

impl LoopLogger for ThrowingLoopLogger {
    fn dependency_loop(&self, edge: &GraphEdge) -> Result<()> {
        Err(ScheduleError::Cycle {
            dependant: edge.dst,
            dependee: edge.src,
        })
    }
}
