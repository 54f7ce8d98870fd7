//! balance-scheduler — a reference host for the balance plugin.
//!
//! Runs one scheduling cycle per pod:
//!
//! - Filters every candidate node in parallel (bounded by `parallelism`)
//! - Scores the feasible nodes against their own forked cycle state
//! - Picks the best node and runs the commit hook on it
//! - Optionally binds the pod in the state store
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── Plugin (FilterPlugin + ScorePlugin + CommitPlugin)
//!   ├── Semaphore (bounds concurrent per-node work)
//!   └── Per-node fork of CycleState
//!       ├── filter → StateHandle
//!       └── score  → NodeScore
//! ```

pub mod binder;
pub mod error;
pub mod scheduler;
pub mod selection;

pub use binder::bind;
pub use error::{FitError, SchedulerError, SchedulerResult};
pub use scheduler::{Evaluation, ScheduleDecision, Scheduler};
pub use selection::{NodeScore, rank};
