//! redb table definitions for the balancegrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Node status keyed by node name.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Bound pods keyed by `{node}:{namespace}/{pod}`.
pub const BINDINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("bindings");

/// Placement decision records keyed by decision id.
pub const DECISIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("decisions");
