//! `DominantBalance` — the plugin as registered with a scheduling host.

use std::sync::Arc;

use balance_core::{Pod, PluginConfig};

use crate::commit::CommitHook;
use crate::cycle_state::{CycleContext, CycleState, StateHandle};
use crate::extractor::ResourceExtractor;
use crate::filter::{FeasibilityFilter, ResourceMap};
use crate::framework::{CommitPlugin, FilterOutcome, FilterPlugin, ScoreOutcome, ScorePlugin};
use crate::provider::ClusterStateProvider;
use crate::scorer::{BalanceScorer, ScoreParams};
use crate::status::Status;

/// Plugin name reported to the host.
pub const NAME: &str = "DominantBalance";

/// Filter, score, and commit stages sharing one extractor.
pub struct DominantBalance<P> {
    filter: FeasibilityFilter<P>,
    scorer: BalanceScorer<P>,
    commit: CommitHook<P>,
}

impl<P: ClusterStateProvider> DominantBalance<P> {
    pub fn new(provider: Arc<P>, config: &PluginConfig) -> Self {
        let extractor = Arc::new(ResourceExtractor::new(provider, config));
        Self {
            filter: FeasibilityFilter::new(Arc::clone(&extractor)),
            scorer: BalanceScorer::new(Arc::clone(&extractor), ScoreParams::from(config)),
            commit: CommitHook::new(extractor),
        }
    }
}

impl<P: ClusterStateProvider> FilterPlugin for DominantBalance<P> {
    type Record = ResourceMap;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn filter(
        &self,
        ctx: &CycleContext,
        state: &mut CycleState,
        pod: &Pod,
        node_name: &str,
    ) -> FilterOutcome<ResourceMap> {
        self.filter.filter(ctx, state, pod, node_name).await
    }
}

impl<P: ClusterStateProvider> ScorePlugin for DominantBalance<P> {
    fn max_score(&self) -> i64 {
        self.scorer.max_score()
    }

    async fn score(
        &self,
        ctx: &CycleContext,
        state: &CycleState,
        record: Option<&StateHandle<ResourceMap>>,
        pod: &Pod,
        node_name: &str,
    ) -> ScoreOutcome {
        self.scorer.score(ctx, state, record, pod, node_name).await
    }
}

impl<P: ClusterStateProvider> CommitPlugin for DominantBalance<P> {
    async fn on_node_chosen(
        &self,
        ctx: &CycleContext,
        state: &CycleState,
        record: Option<&StateHandle<ResourceMap>>,
        pod: &Pod,
        node_name: &str,
    ) -> Status {
        self.commit
            .on_node_chosen(ctx, state, record, pod, node_name)
            .await
    }
}
