//! Commit hook — records the decision once a node has been chosen.
//!
//! Runs after the host has committed to a node. The decision cannot be
//! undone from here, so the hook only emits a record; a failed write is
//! reported back as an Error status for the host to surface.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use balance_core::{Pod, ResourceVector};
use balance_state::DecisionRecord;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::cycle_state::{CycleContext, CycleState, StateHandle};
use crate::extractor::ResourceExtractor;
use crate::filter::ResourceMap;
use crate::provider::ClusterStateProvider;
use crate::status::Status;

pub struct CommitHook<P> {
    extractor: Arc<ResourceExtractor<P>>,
}

impl<P: ClusterStateProvider> CommitHook<P> {
    pub fn new(extractor: Arc<ResourceExtractor<P>>) -> Self {
        Self { extractor }
    }

    pub async fn on_node_chosen(
        &self,
        ctx: &CycleContext,
        state: &CycleState,
        record: Option<&StateHandle<ResourceMap>>,
        pod: &Pod,
        node_name: &str,
    ) -> Status {
        if ctx.is_cancelled() {
            return Status::error("scheduling cycle cancelled");
        }

        let demand = match record.and_then(|h| state.read(h).ok()) {
            Some(map) => map.demand.clone(),
            None => self.extractor.extract_pod_demand(pod).unwrap_or_else(|e| {
                warn!(pod = %pod.key(), error = %e, "pod demand unreadable; recording empty demand");
                ResourceVector::new()
            }),
        };

        let pod_key = pod.key();
        let decision = DecisionRecord {
            id: decision_id(ctx.cycle_id(), &pod_key, node_name),
            cycle_id: ctx.cycle_id(),
            pod: pod_key,
            node: node_name.to_string(),
            demand,
            decided_at: epoch_secs(),
        };
        let id = decision.id.clone();

        match self.extractor.provider().record_decision(decision).await {
            Ok(()) => {
                info!(pod = %pod.key(), node = %node_name, decision = %id, "placement decided");
                Status::success()
            }
            Err(e) => {
                warn!(
                    pod = %pod.key(),
                    node = %node_name,
                    error = %e,
                    "decision record not written; placement stands"
                );
                Status::error(format!("decision record not written: {e}"))
            }
        }
    }
}

/// Hex SHA-256 of `{cycle_id}/{pod}/{node}`.
pub fn decision_id(cycle_id: u64, pod: &str, node: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{cycle_id}/{pod}/{node}").as_bytes());
    hex::encode(hasher.finalize())
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
