//! `balancectl schedule` — run a full cycle and bind the pod.

use std::path::Path;
use std::sync::Arc;

use balance_core::{BalanceConfig, Pod};
use balance_plugin::{DominantBalance, ResourceExtractor};
use balance_scheduler::{ScheduleDecision, Scheduler, bind};
use balance_state::StateStore;
use tokio::sync::watch;
use tracing::warn;

use super::{cancel_on_ctrl_c, candidate_nodes, load_config, load_pod, open_store};

/// Schedule `pod` onto one of the stored nodes and record the binding.
pub async fn run(
    store: &StateStore,
    pod: &Pod,
    config: &BalanceConfig,
    cancel: watch::Receiver<bool>,
) -> anyhow::Result<ScheduleDecision> {
    let provider = Arc::new(store.clone());
    let demand = ResourceExtractor::new(Arc::clone(&provider), &config.plugin)
        .extract_pod_demand(pod)?;
    let plugin = DominantBalance::new(provider, &config.plugin);
    let scheduler = Scheduler::new(Arc::new(plugin), &config.framework)
        .starting_at(store.last_cycle_id()? + 1);
    let nodes = candidate_nodes(store)?;

    let decision = scheduler.schedule_one(pod, &nodes, cancel).await?;
    bind(&decision, demand, store)?;
    Ok(decision)
}

pub async fn schedule(db: &Path, pod: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = open_store(db)?;
    let pod = load_pod(pod)?;

    let decision = run(&store, &pod, &config, cancel_on_ctrl_c()).await?;

    println!("✓ {} → {} (score {})", decision.pod, decision.node, decision.score);
    if let Some(warning) = &decision.commit_warning {
        warn!(pod = %decision.pod, %warning, "decision record missing");
        println!("  warning: {warning}");
    }
    Ok(())
}
