//! balance-state — cluster snapshot store for balancegrid.
//!
//! Backed by [redb](https://docs.rs/redb), holds the node statuses the
//! scheduler reads, the pods already bound to each node (the node's
//! committed usage), and the decision records emitted after placement.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Binding keys (`{node}:{namespace}/{pod}`) enable prefix scans per node.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
