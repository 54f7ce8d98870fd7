//! balancegrid node-selection plugin — feasibility filtering and
//! dominant-resource balance scoring.
//!
//! The plugin is invoked by a scheduling host once per pod per node. It
//! does NOT queue, preempt, or bind pods; it filters out nodes that cannot
//! host the pod and scores the rest by how evenly the placement would load
//! each node's resource dimensions.
//!
//! # Components
//!
//! - **`extractor`** — Pod demand and node capacity vectors
//! - **`filter`** — Feasibility check; publishes vectors into `CycleState`
//! - **`scorer`** — Dominant-resource balance score
//! - **`commit`** — Decision record after a node is chosen
//! - **`cycle_state`** — Per-cycle typed state shared between stages
//! - **`provider`** — Cluster state reads (implemented for `StateStore`)
//! - **`framework`** — Plugin traits the host drives

pub mod commit;
pub mod cycle_state;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod framework;
pub mod plugin;
pub mod provider;
pub mod scorer;
pub mod status;

pub use commit::{CommitHook, decision_id};
pub use cycle_state::{CycleContext, CycleState, StateData, StateHandle, StateKey};
pub use error::{PluginError, PluginResult, ProviderError};
pub use extractor::{NodeResources, ResourceExtractor};
pub use filter::{FeasibilityFilter, Insufficient, RESOURCE_MAP, ResourceMap, fits};
pub use framework::{CommitPlugin, FilterOutcome, FilterPlugin, ScoreOutcome, ScorePlugin};
pub use plugin::{DominantBalance, NAME};
pub use provider::ClusterStateProvider;
pub use scorer::{BalanceScore, BalanceScorer, DominantResource, ScoreParams, balance_score};
pub use status::{Code, Status};
