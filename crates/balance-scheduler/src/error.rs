//! Scheduler error types.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// No candidate node passed filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitError {
    pub pod: String,
    pub num_nodes: usize,
    /// Node name → rejection reason.
    pub reasons: BTreeMap<String, String>,
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0/{} nodes are available for pod {}",
            self.num_nodes, self.pod
        )?;
        for (node, reason) in &self.reasons {
            write!(f, "; {node}: {reason}")?;
        }
        Ok(())
    }
}

/// Errors that can end a scheduling cycle without a placement.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("{0}")]
    Unschedulable(FitError),

    #[error("no node could be scored for pod {0}")]
    NoScoredNodes(String),

    #[error("scheduling cycle cancelled for pod {0}")]
    Cancelled(String),

    #[error("scheduling task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("state store error: {0}")]
    State(#[from] balance_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
