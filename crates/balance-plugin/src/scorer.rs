//! Dominant-resource balance scoring.
//!
//! For every resource the node or pod carries, compute the post-placement
//! utilization ratio `(used + demand) / capacity`. The resource with the
//! highest ratio is the dominant one (the placement's bottleneck). The
//! dispersion of the ratios is the balance deviation: a placement that
//! drives one resource far above the others disperses them. The score is
//! the deviation inverted and rescaled into `0..=max_score`, so even
//! utilization across dimensions scores highest.

use std::collections::BTreeMap;
use std::sync::Arc;

use balance_core::{DeviationKind, Pod, PluginConfig, ResourceVector};
use tracing::{debug, warn};

use crate::cycle_state::{CycleContext, CycleState, StateHandle};
use crate::error::{PluginError, PluginResult};
use crate::extractor::{NodeResources, ResourceExtractor};
use crate::filter::ResourceMap;
use crate::framework::ScoreOutcome;
use crate::provider::ClusterStateProvider;
use crate::status::Status;

/// Largest dispersion (standard or mean absolute deviation) a set of
/// values in `[0, 1]` can have.
const MAX_DEVIATION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreParams {
    pub max_score: i64,
    pub deviation: DeviationKind,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            max_score: 100,
            deviation: DeviationKind::StdDev,
        }
    }
}

impl From<&PluginConfig> for ScoreParams {
    fn from(config: &PluginConfig) -> Self {
        Self {
            max_score: config.max_node_score.max(0),
            deviation: config.deviation,
        }
    }
}

/// The resource that would become the node's bottleneck.
#[derive(Debug, Clone, PartialEq)]
pub struct DominantResource {
    pub name: String,
    pub ratio: f64,
}

/// Balance score with its breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceScore {
    /// Range: `0..=max_score`, higher = more balanced.
    pub score: i64,
    pub deviation: f64,
    pub dominant: Option<DominantResource>,
    /// Post-placement utilization per considered resource.
    pub ratios: BTreeMap<String, f64>,
}

impl BalanceScore {
    /// Dominant ratio, or zero when no resource was considered.
    pub fn dominant_ratio(&self) -> f64 {
        self.dominant.as_ref().map_or(0.0, |d| d.ratio)
    }
}

/// Score placing `demand` on `node`.
///
/// Resources with zero capacity and zero demand are skipped. Zero capacity
/// with positive demand counts as fully used. Ratios are clamped to
/// `[0, 1]`.
pub fn balance_score(demand: &ResourceVector, node: &NodeResources, params: &ScoreParams) -> BalanceScore {
    let mut names: Vec<&str> = demand.keys().chain(node.capacity.keys()).collect();
    names.sort_unstable();
    names.dedup();

    let mut ratios = BTreeMap::new();
    for name in names {
        let capacity = node.capacity.get(name);
        let requested = demand.get(name);
        if capacity == 0 && requested == 0 {
            continue;
        }
        let ratio = if capacity == 0 {
            1.0
        } else {
            let projected = node.used.get(name).saturating_add(requested);
            (projected as f64 / capacity as f64).min(1.0)
        };
        ratios.insert(name.to_string(), ratio);
    }

    // First maximum in sorted key order.
    let dominant = ratios
        .iter()
        .fold(None::<(&String, f64)>, |best, (name, &ratio)| match best {
            Some((_, top)) if top >= ratio => best,
            _ => Some((name, ratio)),
        })
        .map(|(name, ratio)| DominantResource {
            name: name.clone(),
            ratio,
        });

    let deviation = dispersion(ratios.values().copied(), params.deviation);
    let max = params.max_score.max(0) as f64;
    let penalty = (max * deviation / MAX_DEVIATION).round();
    let score = (max - penalty).clamp(0.0, max) as i64;

    BalanceScore {
        score,
        deviation,
        dominant,
        ratios,
    }
}

fn dispersion(values: impl Iterator<Item = f64> + Clone, kind: DeviationKind) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    match kind {
        DeviationKind::StdDev => {
            let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            variance.sqrt()
        }
        DeviationKind::MeanAbsolute => values.map(|v| (v - mean).abs()).sum::<f64>() / n as f64,
    }
}

pub struct BalanceScorer<P> {
    extractor: Arc<ResourceExtractor<P>>,
    params: ScoreParams,
}

impl<P: ClusterStateProvider> BalanceScorer<P> {
    pub fn new(extractor: Arc<ResourceExtractor<P>>, params: ScoreParams) -> Self {
        Self { extractor, params }
    }

    pub fn max_score(&self) -> i64 {
        self.params.max_score
    }

    pub async fn score(
        &self,
        ctx: &CycleContext,
        state: &CycleState,
        record: Option<&StateHandle<ResourceMap>>,
        pod: &Pod,
        node_name: &str,
    ) -> ScoreOutcome {
        match self.evaluate(ctx, state, record, pod, node_name).await {
            Ok(result) => {
                debug!(
                    pod = %pod.key(),
                    node = %node_name,
                    score = result.score,
                    deviation = result.deviation,
                    dominant = ?result.dominant,
                    "node scored"
                );
                ScoreOutcome {
                    status: Status::success(),
                    score: result.score,
                    dominant_ratio: result.dominant_ratio(),
                }
            }
            Err(e) => {
                warn!(pod = %pod.key(), node = %node_name, error = %e, "node not scored");
                ScoreOutcome::failed(e.to_status())
            }
        }
    }

    async fn evaluate(
        &self,
        ctx: &CycleContext,
        state: &CycleState,
        record: Option<&StateHandle<ResourceMap>>,
        pod: &Pod,
        node_name: &str,
    ) -> PluginResult<BalanceScore> {
        if ctx.is_cancelled() {
            return Err(PluginError::Cancelled);
        }

        let cached = match record.map(|h| state.read(h)) {
            Some(Ok(map)) if map.node.node_name == node_name => Some(map.clone()),
            Some(Ok(_)) | None => None,
            Some(Err(e)) => {
                debug!(node = %node_name, error = %e, "recomputing resources");
                None
            }
        };

        let map = match cached {
            Some(map) => map,
            None => ResourceMap {
                demand: self.extractor.extract_pod_demand(pod)?,
                node: self.extractor.extract_node_capacity(ctx, node_name).await?,
            },
        };

        Ok(balance_score(&map.demand, &map.node, &self.params))
    }
}
