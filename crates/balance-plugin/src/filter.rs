//! Feasibility filter — rejects nodes that cannot satisfy the pod's demand.
//!
//! On a pass the extracted vectors are written into [`CycleState`] so the
//! scorer can reuse them without a second node read.

use std::sync::Arc;

use balance_core::{Pod, ResourceVector};
use tracing::debug;

use crate::cycle_state::{CycleContext, CycleState, StateHandle, StateKey};
use crate::error::{PluginError, PluginResult};
use crate::extractor::{NodeResources, ResourceExtractor};
use crate::framework::FilterOutcome;
use crate::provider::ClusterStateProvider;
use crate::status::Status;

/// Demand and node resources captured during filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMap {
    pub demand: ResourceVector,
    pub node: NodeResources,
}

/// Cycle state key for [`ResourceMap`].
pub const RESOURCE_MAP: StateKey<ResourceMap> = StateKey::new("DominantBalance/ResourceMap", 1);

/// The first resource a node is short of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insufficient {
    pub resource: String,
    pub requested: u64,
    pub available: u64,
}

impl From<Insufficient> for PluginError {
    fn from(i: Insufficient) -> Self {
        PluginError::Infeasible {
            resource: i.resource,
            requested: i.requested,
            available: i.available,
        }
    }
}

/// Check `demand` against `available`, resource by resource in sorted order.
///
/// A key missing from `available` counts as zero.
pub fn fits(demand: &ResourceVector, available: &ResourceVector) -> Result<(), Insufficient> {
    for (resource, requested) in demand.iter() {
        if requested == 0 {
            continue;
        }
        let have = available.get(resource);
        if have < requested {
            return Err(Insufficient {
                resource: resource.to_string(),
                requested,
                available: have,
            });
        }
    }
    Ok(())
}

pub struct FeasibilityFilter<P> {
    extractor: Arc<ResourceExtractor<P>>,
}

impl<P: ClusterStateProvider> FeasibilityFilter<P> {
    pub fn new(extractor: Arc<ResourceExtractor<P>>) -> Self {
        Self { extractor }
    }

    pub async fn filter(
        &self,
        ctx: &CycleContext,
        state: &mut CycleState,
        pod: &Pod,
        node_name: &str,
    ) -> FilterOutcome<ResourceMap> {
        match self.evaluate(ctx, state, pod, node_name).await {
            Ok(record) => FilterOutcome {
                status: Status::success(),
                record,
            },
            Err(e) => {
                if e.is_infeasible() {
                    debug!(pod = %pod.key(), node = %node_name, reason = %e, "node filtered out");
                }
                FilterOutcome {
                    status: e.to_status(),
                    record: None,
                }
            }
        }
    }

    async fn evaluate(
        &self,
        ctx: &CycleContext,
        state: &mut CycleState,
        pod: &Pod,
        node_name: &str,
    ) -> PluginResult<Option<StateHandle<ResourceMap>>> {
        let demand = self.extractor.extract_pod_demand(pod)?;

        let (node, lookup_failure) = match self.extractor.extract_node_capacity(ctx, node_name).await {
            Ok(node) => (node, None),
            // Unreadable node: treat its capacity as empty.
            Err(PluginError::NodeLookup { reason, .. }) => {
                (NodeResources::new(node_name, ResourceVector::new()), Some(reason))
            }
            Err(e) => return Err(e),
        };

        if let Err(short) = fits(&demand, &node.available()) {
            return Err(match lookup_failure {
                Some(reason) => PluginError::UnreadableNode {
                    resource: short.resource,
                    requested: short.requested,
                    reason,
                },
                None => short.into(),
            });
        }

        if ctx.is_cancelled() {
            return Err(PluginError::Cancelled);
        }
        if lookup_failure.is_some() {
            // Nothing trustworthy to publish; the scorer re-reads the node.
            return Ok(None);
        }

        let handle = state.write(&RESOURCE_MAP, ResourceMap { demand, node })?;
        debug!(pod = %pod.key(), node = %node_name, "node feasible");
        Ok(Some(handle))
    }
}
