//! Read access to cluster state.
//!
//! Bridges the plugin to whatever owns node objects. The implementation
//! for [`StateStore`] derives a node's committed usage from the pods
//! already bound to it.

use std::future::Future;

use balance_core::{NodeStatus, ResourceVector};
use balance_state::{DecisionRecord, StateStore};
use tracing::debug;

use crate::error::ProviderError;

/// Cluster state reads used by the extractor, plus the decision sink used
/// by the commit hook.
///
/// Implementations must be read-only with respect to node objects and
/// safe to call concurrently from many node evaluations.
pub trait ClusterStateProvider: Send + Sync + 'static {
    /// Current status of a node.
    fn node_status(
        &self,
        node: &str,
    ) -> impl Future<Output = Result<NodeStatus, ProviderError>> + Send;

    /// Resources already committed to pods bound on `node`, in base units.
    fn node_usage(
        &self,
        node: &str,
    ) -> impl Future<Output = Result<ResourceVector, ProviderError>> + Send;

    /// Persist a placement decision. The default discards it.
    fn record_decision(
        &self,
        record: DecisionRecord,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        let _ = record;
        std::future::ready(Ok(()))
    }
}

impl ClusterStateProvider for StateStore {
    async fn node_status(&self, node: &str) -> Result<NodeStatus, ProviderError> {
        self.get_node(node)
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?
            .ok_or_else(|| ProviderError::NotFound(node.to_string()))
    }

    async fn node_usage(&self, node: &str) -> Result<ResourceVector, ProviderError> {
        let bindings = self
            .list_bindings_for_node(node)
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        let usage = bindings
            .iter()
            .fold(ResourceVector::new(), |acc, b| acc.merged(&b.requests));
        debug!(%node, pods = bindings.len(), "node usage computed");
        Ok(usage)
    }

    async fn record_decision(&self, record: DecisionRecord) -> Result<(), ProviderError> {
        self.put_decision(&record)
            .map_err(|e| ProviderError::Unavailable(e.to_string()))
    }
}
