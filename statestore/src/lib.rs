//! A versioned, authenticated, named-tree key-value store.
//!
//! Every commit produces a snapshot addressed by a `u64` version. A snapshot maps
//! tree names to the content each tree had when the snapshot was taken. Committing
//! a set of trees loaded from snapshot `v` always produces snapshot `v + 1`, so the
//! version chain is a deterministic function of the chain content: replaying the
//! same blocks yields the same versions. Snapshots are never deleted; a reorg that
//! re-executes a slot simply rewrites the snapshot at the same version.

mod errors;
mod store;
mod tree;

pub use errors::{StateError, StateResult};
pub use store::{Snapshot, StateStore};
pub use tree::Tree;
