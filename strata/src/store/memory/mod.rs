//! In-memory store provider.
//!
//! Records and edges live in index-stable arena slots. Every write made
//! inside a transaction is journaled as an undo operation so the outermost
//! scope can be rolled back precisely.

mod arena;
mod config;
mod store;

pub use config::*;
pub use store::*;
