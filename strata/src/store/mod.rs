//! Storage backends and abstractions.
//!
//! The store holds opaque records connected by typed, directed edges. Every
//! record carries a property bag. All writes happen inside a transaction
//! scope obtained from [`GraphStore::begin_transaction`].
//!
//! # Storage Providers
//!
//! Providers implement [`GraphStoreProvider`] and are wrapped in the cheap to
//! clone [`GraphStore`] handle. Strata ships with:
//! - **In-Memory Store**: [`memory::InMemoryGraphStore`], an arena of
//!   index-stable records and edges with an undo journal for rollback
//!
//! # Transactions
//!
//! Transactions nest. Only the outermost scope finalizes; a rollback at any
//! depth marks the whole transaction rollback-only, and a scope dropped
//! without an explicit commit rolls back.

pub mod memory;
mod graph_store;
mod transaction;
mod types;

pub use graph_store::*;
pub use transaction::*;
pub use types::*;
