//! Plugin error types.

use balance_core::QuantityError;
use thiserror::Error;

use crate::status::Status;

/// Errors from the cluster state provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("cluster state unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised inside the filter, score, and commit stages.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PluginError {
    #[error("node lookup failed for {node}: {reason}")]
    NodeLookup { node: String, reason: String },

    #[error("Insufficient {resource} (requested {requested}, available {available})")]
    Infeasible {
        resource: String,
        requested: u64,
        available: u64,
    },

    /// Infeasible only because the node could not be read.
    #[error("Insufficient {resource} (requested {requested}, available 0); node lookup failed: {reason}")]
    UnreadableNode {
        resource: String,
        requested: u64,
        reason: String,
    },

    #[error("cycle state miss: {key}")]
    StateMiss { key: &'static str },

    #[error("cycle state key already written: {key}")]
    StateConflict { key: &'static str },

    #[error("malformed resource quantity for {resource}: {source}")]
    MalformedQuantity {
        resource: String,
        #[source]
        source: QuantityError,
    },

    #[error("scheduling cycle cancelled")]
    Cancelled,
}

pub type PluginResult<T> = Result<T, PluginError>;

impl PluginError {
    /// Map the error onto the status reported to the host.
    ///
    /// Only an infeasible node is `Unschedulable`; everything else marks the
    /// node unusable for this cycle.
    pub fn to_status(&self) -> Status {
        if self.is_infeasible() {
            Status::unschedulable(self.to_string())
        } else {
            Status::error(self.to_string())
        }
    }

    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            PluginError::Infeasible { .. } | PluginError::UnreadableNode { .. }
        )
    }
}
