//! `balancectl score` — dry-run filter and score across the stored nodes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use balance_core::{BalanceConfig, Pod};
use balance_plugin::DominantBalance;
use balance_scheduler::{NodeScore, Scheduler};
use balance_state::StateStore;
use serde::Serialize;
use tokio::sync::watch;

use super::{cancel_on_ctrl_c, candidate_nodes, load_config, load_pod, open_store};

#[derive(Debug, Serialize)]
pub struct ScoreReport {
    pub pod: String,
    /// Best first.
    pub scores: Vec<NodeScore>,
    pub rejected: BTreeMap<String, String>,
    pub excluded: BTreeMap<String, String>,
}

pub async fn evaluate(
    store: &StateStore,
    pod: &Pod,
    config: &BalanceConfig,
    cancel: watch::Receiver<bool>,
) -> anyhow::Result<ScoreReport> {
    let plugin = DominantBalance::new(Arc::new(store.clone()), &config.plugin);
    let scheduler = Scheduler::new(Arc::new(plugin), &config.framework)
        .starting_at(store.last_cycle_id()? + 1);
    let nodes = candidate_nodes(store)?;

    let evaluation = scheduler.evaluate(pod, &nodes, cancel).await?;
    Ok(ScoreReport {
        pod: pod.key(),
        scores: evaluation.scores,
        rejected: evaluation.rejected,
        excluded: evaluation.excluded,
    })
}

pub async fn score(
    db: &Path,
    pod: &Path,
    config: Option<&Path>,
    format: &str,
) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let store = open_store(db)?;
    let pod = load_pod(pod)?;

    let report = evaluate(&store, &pod, &config, cancel_on_ctrl_c()).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!("{}", format_report(&report));
        }
    }
    Ok(())
}

pub fn format_report(report: &ScoreReport) -> String {
    let mut out = format!("Pod {}\n", report.pod);
    if report.scores.is_empty() {
        out.push_str("  no node scored\n");
    }
    for s in &report.scores {
        out.push_str(&format!(
            "  {:<20} {:>4}  (dominant ratio {:.3})\n",
            s.node, s.score, s.dominant_ratio
        ));
    }
    for (node, reason) in &report.rejected {
        out.push_str(&format!("  ✗ {node}: {reason}\n"));
    }
    for (node, reason) in &report.excluded {
        out.push_str(&format!("  ! {node}: {reason}\n"));
    }
    out.trim_end().to_string()
}
