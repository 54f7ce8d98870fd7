//! Binder — records a placement in the state store.
//!
//! The plugin never binds pods itself. Writing a [`PodBinding`] makes the
//! pod's demand count toward the node's usage in later cycles. A pod holds
//! at most one binding; rebinding it moves the binding.

use std::time::{SystemTime, UNIX_EPOCH};

use balance_core::ResourceVector;
use balance_state::{PodBinding, StateStore};
use tracing::info;

use crate::error::SchedulerResult;
use crate::scheduler::ScheduleDecision;

/// Persist `decision` as a binding carrying `demand`.
pub fn bind(
    decision: &ScheduleDecision,
    demand: ResourceVector,
    state: &StateStore,
) -> SchedulerResult<PodBinding> {
    let binding = PodBinding {
        pod: decision.pod.clone(),
        node: decision.node.clone(),
        requests: demand,
        bound_at: epoch_secs(),
    };
    let displaced = state.rebind(&binding)?;
    info!(pod = %binding.pod, node = %binding.node, displaced, "pod bound");
    Ok(binding)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
