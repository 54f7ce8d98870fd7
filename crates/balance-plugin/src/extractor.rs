//! Resource extraction — pod demand and node capacity vectors.

use std::sync::Arc;
use std::time::Duration;

use balance_core::{
    CapacitySource, NodeStatus, Pod, PluginConfig, ResourceList, ResourceVector,
    quantity::to_base_units,
};
use tracing::{debug, warn};

use crate::cycle_state::CycleContext;
use crate::error::{PluginError, PluginResult};
use crate::provider::ClusterStateProvider;

/// Capacity and committed usage for a single node, in base units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeResources {
    pub node_name: String,
    pub capacity: ResourceVector,
    pub used: ResourceVector,
}

impl NodeResources {
    /// Node with capacity only (no committed usage).
    pub fn new(node_name: impl Into<String>, capacity: ResourceVector) -> Self {
        Self {
            node_name: node_name.into(),
            capacity,
            used: ResourceVector::new(),
        }
    }

    pub fn with_used(mut self, used: ResourceVector) -> Self {
        self.used = used;
        self
    }

    /// Capacity not yet committed, floored at zero.
    pub fn available(&self) -> ResourceVector {
        self.capacity.saturating_sub(&self.used)
    }
}

/// Builds demand and capacity vectors for a scheduling cycle.
pub struct ResourceExtractor<P> {
    provider: Arc<P>,
    capacity_source: CapacitySource,
    lookup_timeout: Duration,
    milli_resources: Vec<String>,
}

impl<P: ClusterStateProvider> ResourceExtractor<P> {
    pub fn new(provider: Arc<P>, config: &PluginConfig) -> Self {
        Self {
            provider,
            capacity_source: config.capacity_source,
            lookup_timeout: config.lookup_timeout(),
            milli_resources: config.milli_resources.clone(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Sum of every container's requests, per resource.
    ///
    /// A pod without requests yields an empty vector.
    pub fn extract_pod_demand(&self, pod: &Pod) -> PluginResult<ResourceVector> {
        let mut demand = ResourceVector::new();
        for container in &pod.containers {
            for (name, raw) in &container.requests {
                demand.add(name, self.parse(name, raw)?);
            }
        }
        debug!(pod = %pod.key(), ?demand, "pod demand extracted");
        Ok(demand)
    }

    /// Read the node's capacity and committed usage.
    ///
    /// Bounded by the lookup timeout; a timeout or provider failure is a
    /// [`PluginError::NodeLookup`]. Returns [`PluginError::Cancelled`] if
    /// the cycle is cancelled first.
    pub async fn extract_node_capacity(
        &self,
        ctx: &CycleContext,
        node_name: &str,
    ) -> PluginResult<NodeResources> {
        let lookup = async {
            let status = self.provider.node_status(node_name).await?;
            let used = self.provider.node_usage(node_name).await?;
            Ok::<_, crate::error::ProviderError>((status, used))
        };

        let (status, used) = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(PluginError::Cancelled),
            result = tokio::time::timeout(self.lookup_timeout, lookup) => match result {
                Ok(Ok(found)) => found,
                Ok(Err(e)) => {
                    warn!(node = %node_name, error = %e, "node lookup failed");
                    return Err(PluginError::NodeLookup {
                        node: node_name.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(node = %node_name, timeout = ?self.lookup_timeout, "node lookup timed out");
                    return Err(PluginError::NodeLookup {
                        node: node_name.to_string(),
                        reason: format!("timed out after {:?}", self.lookup_timeout),
                    });
                }
            },
        };

        let capacity = self.parse_list(self.capacity_list(&status))?;
        debug!(node = %node_name, ?capacity, ?used, "node capacity extracted");
        Ok(NodeResources {
            node_name: node_name.to_string(),
            capacity,
            used,
        })
    }

    fn capacity_list<'a>(&self, status: &'a NodeStatus) -> &'a ResourceList {
        match self.capacity_source {
            CapacitySource::Allocatable if !status.allocatable.is_empty() => &status.allocatable,
            _ => &status.capacity,
        }
    }

    fn parse_list(&self, list: &ResourceList) -> PluginResult<ResourceVector> {
        list.iter()
            .map(|(name, raw)| Ok((name.clone(), self.parse(name, raw)?)))
            .collect()
    }

    fn parse(&self, name: &str, raw: &str) -> PluginResult<u64> {
        to_base_units(name, raw, &self.milli_resources).map_err(|source| {
            PluginError::MalformedQuantity {
                resource: name.to_string(),
                source,
            }
        })
    }
}
