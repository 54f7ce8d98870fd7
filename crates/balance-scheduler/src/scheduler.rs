//! Scheduler — runs one scheduling cycle per pod.
//!
//! A cycle filters every candidate node, scores the survivors, selects a
//! winner, and runs the commit hook on it. Each node is evaluated against
//! its own fork of the cycle state, so concurrent node evaluations never
//! share mutable data.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use balance_core::{FrameworkConfig, Pod};
use balance_plugin::{
    Code, CommitPlugin, CycleContext, CycleState, FilterPlugin, ScorePlugin, StateHandle,
};

use crate::error::{FitError, SchedulerError, SchedulerResult};
use crate::selection::{NodeScore, rank};

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDecision {
    pub cycle_id: u64,
    /// `namespace/name` of the pod.
    pub pod: String,
    pub node: String,
    pub score: i64,
    /// Every scored node, best first.
    pub scores: Vec<NodeScore>,
    /// Nodes the filter rejected as unschedulable, with reasons.
    pub rejected: BTreeMap<String, String>,
    /// Nodes dropped because filtering or scoring errored.
    pub excluded: BTreeMap<String, String>,
    /// Set when the commit hook failed; the placement still stands.
    pub commit_warning: Option<String>,
}

/// Filter and score results for one pod, before any node is chosen.
pub struct Evaluation<R> {
    pub cycle_id: u64,
    /// Scored nodes, best first.
    pub scores: Vec<NodeScore>,
    pub rejected: BTreeMap<String, String>,
    pub excluded: BTreeMap<String, String>,
    forks: HashMap<String, NodeFork<R>>,
}

impl<R> Evaluation<R> {
    pub fn best(&self) -> Option<&NodeScore> {
        self.scores.first()
    }
}

struct NodeFork<R> {
    state: CycleState,
    record: Option<StateHandle<R>>,
}

/// Drives a plugin through filter, score, and commit.
pub struct Scheduler<P> {
    plugin: Arc<P>,
    parallelism: usize,
    next_cycle: AtomicU64,
}

impl<P> Scheduler<P>
where
    P: FilterPlugin + ScorePlugin + CommitPlugin,
{
    pub fn new(plugin: Arc<P>, config: &FrameworkConfig) -> Self {
        Self {
            plugin,
            parallelism: config.parallelism.max(1),
            next_cycle: AtomicU64::new(1),
        }
    }

    /// Number cycles from `first_cycle` instead of 1, so ids stay unique
    /// across scheduler instances sharing one decision log.
    pub fn starting_at(self, first_cycle: u64) -> Self {
        Self {
            next_cycle: AtomicU64::new(first_cycle.max(1)),
            ..self
        }
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    /// Filter and score `pod` against `nodes` without committing.
    pub async fn evaluate(
        &self,
        pod: &Pod,
        nodes: &[String],
        cancel: watch::Receiver<bool>,
    ) -> SchedulerResult<Evaluation<P::Record>> {
        let cycle_id = self.next_cycle.fetch_add(1, Ordering::Relaxed);
        let ctx = CycleContext::new(cycle_id, cancel);
        self.evaluate_in(&ctx, pod, nodes).await
    }

    /// Run a full cycle for `pod` and return the chosen node.
    pub async fn schedule_one(
        &self,
        pod: &Pod,
        nodes: &[String],
        cancel: watch::Receiver<bool>,
    ) -> SchedulerResult<ScheduleDecision> {
        let cycle_id = self.next_cycle.fetch_add(1, Ordering::Relaxed);
        let ctx = CycleContext::new(cycle_id, cancel);
        let mut evaluation = self.evaluate_in(&ctx, pod, nodes).await?;

        let Some(best) = evaluation.scores.first().cloned() else {
            return Err(SchedulerError::NoScoredNodes(pod.key()));
        };
        if ctx.is_cancelled() {
            return Err(SchedulerError::Cancelled(pod.key()));
        }

        let fork = evaluation
            .forks
            .remove(&best.node)
            .ok_or_else(|| SchedulerError::NoScoredNodes(pod.key()))?;
        let status = self
            .plugin
            .on_node_chosen(&ctx, &fork.state, fork.record.as_ref(), pod, &best.node)
            .await;
        let commit_warning = if status.is_success() {
            None
        } else {
            warn!(
                pod = %pod.key(),
                node = %best.node,
                status = %status.message(),
                "commit hook failed"
            );
            Some(status.message())
        };

        info!(
            cycle = cycle_id,
            pod = %pod.key(),
            node = %best.node,
            score = best.score,
            "node selected"
        );

        Ok(ScheduleDecision {
            cycle_id,
            pod: pod.key(),
            node: best.node,
            score: best.score,
            scores: evaluation.scores,
            rejected: evaluation.rejected,
            excluded: evaluation.excluded,
            commit_warning,
        })
    }

    async fn evaluate_in(
        &self,
        ctx: &CycleContext,
        pod: &Pod,
        nodes: &[String],
    ) -> SchedulerResult<Evaluation<P::Record>> {
        let pod_key = pod.key();
        let pod = Arc::new(pod.clone());
        let base = CycleState::new(ctx.cycle_id());
        let semaphore = Arc::new(Semaphore::new(self.parallelism));

        // ── Filter ─────────────────────────────────────────────────

        let mut filters = JoinSet::new();
        for node in nodes {
            let plugin = Arc::clone(&self.plugin);
            let pod = Arc::clone(&pod);
            let ctx = ctx.clone();
            let semaphore = Arc::clone(&semaphore);
            let node = node.clone();
            let mut state = base.fork();
            filters.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = plugin.filter(&ctx, &mut state, &pod, &node).await;
                (node, state, outcome)
            });
        }

        let mut feasible = Vec::new();
        let mut rejected = BTreeMap::new();
        let mut excluded = BTreeMap::new();
        while let Some(joined) = filters.join_next().await {
            let (node, state, outcome) = joined?;
            if outcome.status.is_success() {
                feasible.push((node, NodeFork { state, record: outcome.record }));
            } else if outcome.status.code() == Code::Unschedulable {
                rejected.insert(node, outcome.status.message());
            } else {
                warn!(pod = %pod_key, %node, status = %outcome.status.message(), "filter failed");
                excluded.insert(node, outcome.status.message());
            }
        }

        if ctx.is_cancelled() {
            return Err(SchedulerError::Cancelled(pod_key));
        }
        debug!(
            pod = %pod_key,
            feasible = feasible.len(),
            rejected = rejected.len(),
            excluded = excluded.len(),
            "filter phase done"
        );
        if feasible.is_empty() {
            let mut reasons = rejected;
            reasons.extend(excluded);
            return Err(SchedulerError::Unschedulable(FitError {
                pod: pod_key,
                num_nodes: nodes.len(),
                reasons,
            }));
        }

        // ── Score ──────────────────────────────────────────────────

        let mut scorers = JoinSet::new();
        for (node, fork) in feasible {
            let plugin = Arc::clone(&self.plugin);
            let pod = Arc::clone(&pod);
            let ctx = ctx.clone();
            let semaphore = Arc::clone(&semaphore);
            scorers.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = plugin
                    .score(&ctx, &fork.state, fork.record.as_ref(), &pod, &node)
                    .await;
                (node, fork, outcome)
            });
        }

        let max_score = self.plugin.max_score();
        let mut scores = Vec::new();
        let mut forks = HashMap::new();
        while let Some(joined) = scorers.join_next().await {
            let (node, fork, outcome) = joined?;
            if !outcome.status.is_success() {
                warn!(pod = %pod_key, %node, status = %outcome.status.message(), "score failed");
                excluded.insert(node, outcome.status.message());
                continue;
            }
            if !(0..=max_score).contains(&outcome.score) {
                warn!(pod = %pod_key, %node, score = outcome.score, "score out of range");
                excluded.insert(
                    node,
                    format!("score {} outside [0, {max_score}]", outcome.score),
                );
                continue;
            }
            scores.push(NodeScore {
                node: node.clone(),
                score: outcome.score,
                dominant_ratio: outcome.dominant_ratio,
            });
            forks.insert(node, fork);
        }

        if ctx.is_cancelled() {
            return Err(SchedulerError::Cancelled(pod_key));
        }
        rank(&mut scores);

        Ok(Evaluation {
            cycle_id: ctx.cycle_id(),
            scores,
            rejected,
            excluded,
            forks,
        })
    }
}
