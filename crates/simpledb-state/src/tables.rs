//! redb table definitions for the SimpleDB state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Keys follow the pattern `{namespace}/{name}`.

use redb::TableDefinition;

/// Desired-state objects keyed by `{namespace}/{name}`.
pub const SIMPLEDBS: TableDefinition<&str, &[u8]> = TableDefinition::new("simpledbs");

/// Workloads keyed by their owner's `{namespace}/{name}`.
pub const WORKLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("workloads");
