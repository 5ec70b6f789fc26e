//! Store-backed R-tree.
//!
//! The tree lives entirely in a [`GraphStore`](strata::store::GraphStore):
//! index nodes are records, parent/child links are `RTREE_CHILD` edges and
//! leaf entries are `RTREE_REFERENCE` edges to the indexed records. Nothing is
//! cached in memory beyond the fanout and the engine statistics, so any
//! number of [`RTreeIndex`] handles over the same layer see the same tree.

pub mod constants;
pub mod index_node;
mod config;
mod engine;
mod split;
mod stats;
mod validate;

pub use config::{RTreeConfig, RTreeConfigBuilder};
pub use engine::{IndexedRecords, RTreeIndex};
pub use index_node::IndexNodeRepository;
pub use stats::RTreeStats;
