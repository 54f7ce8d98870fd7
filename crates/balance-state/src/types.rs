//! Records persisted by the state store beyond the node statuses
//! defined in `balance-core`.

use serde::{Deserialize, Serialize};

use balance_core::ResourceVector;

pub use balance_core::NodeStatus;

/// A pod bound to a node. The sum of a node's bindings is the node's
/// committed usage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodBinding {
    /// `{namespace}/{name}` of the pod.
    pub pod: String,
    pub node: String,
    /// Requests in base units, as extracted at scheduling time.
    pub requests: ResourceVector,
    /// Unix timestamp (seconds) of the bind.
    pub bound_at: u64,
}

/// Record emitted once a node has been chosen for a pod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    /// Hex SHA-256 of `{cycle_id}/{pod}/{node}`.
    pub id: String,
    pub cycle_id: u64,
    pub pod: String,
    pub node: String,
    pub demand: ResourceVector,
    /// Unix timestamp (seconds) of the decision.
    pub decided_at: u64,
}

impl PodBinding {
    /// Build the composite key for the bindings table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.node, self.pod)
    }
}
