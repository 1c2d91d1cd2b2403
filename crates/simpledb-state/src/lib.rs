//! simpledb-state: embedded state store for the SimpleDB operator.
//!
//! Backed by [redb](https://docs.rs/redb), holds the two kinds of records
//! the control loop works with:
//!
//! - `SimpleDb`: the user-declared desired state plus its status conditions
//! - `Workload`: the running replica set owned by a `SimpleDb`
//!
//! # Architecture
//!
//! Both tables are keyed by `{namespace}/{name}` with JSON-serialized values.
//! A workload shares its owner's key, so ownership lookups never scan.
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
