//! Extension points the scheduling host drives.
//!
//! A host runs [`FilterPlugin::filter`] for every candidate node, then
//! [`ScorePlugin::score`] for the nodes that passed, and finally
//! [`CommitPlugin::on_node_chosen`] for the selected node. Every call gets
//! the node's own forked [`CycleState`].

use std::future::Future;

use balance_core::Pod;

use crate::cycle_state::{CycleContext, CycleState, StateData, StateHandle};
use crate::status::Status;

/// Result of filtering one node.
#[derive(Debug)]
pub struct FilterOutcome<R> {
    pub status: Status,
    /// Handle to the record the filter published, if any.
    pub record: Option<StateHandle<R>>,
}

/// Result of scoring one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub status: Status,
    pub score: i64,
    /// Post-placement ratio of the node's dominant resource; lower wins
    /// ties between equal scores.
    pub dominant_ratio: f64,
}

impl ScoreOutcome {
    pub fn failed(status: Status) -> Self {
        Self {
            status,
            score: 0,
            dominant_ratio: f64::INFINITY,
        }
    }
}

pub trait FilterPlugin: Send + Sync + 'static {
    /// Record type published into cycle state on a pass.
    type Record: StateData;

    fn name(&self) -> &'static str;

    fn filter(
        &self,
        ctx: &CycleContext,
        state: &mut CycleState,
        pod: &Pod,
        node_name: &str,
    ) -> impl Future<Output = FilterOutcome<Self::Record>> + Send;
}

pub trait ScorePlugin: FilterPlugin {
    /// Upper bound of the scores this plugin returns.
    fn max_score(&self) -> i64;

    fn score(
        &self,
        ctx: &CycleContext,
        state: &CycleState,
        record: Option<&StateHandle<Self::Record>>,
        pod: &Pod,
        node_name: &str,
    ) -> impl Future<Output = ScoreOutcome> + Send;
}

pub trait CommitPlugin: FilterPlugin {
    /// Runs once after the host has chosen `node_name`. A failure here
    /// cannot undo the choice.
    fn on_node_chosen(
        &self,
        ctx: &CycleContext,
        state: &CycleState,
        record: Option<&StateHandle<Self::Record>>,
        pod: &Pod,
        node_name: &str,
    ) -> impl Future<Output = Status> + Send;
}
