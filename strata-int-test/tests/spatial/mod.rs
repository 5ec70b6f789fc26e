//! Spatial integration test module.
//!
//! These tests drive the R-tree through its public API on top of the
//! in-memory store.

mod rtree_bulk_test;
mod rtree_invariant_test;
mod rtree_search_test;
mod rtree_split_test;
mod rtree_transaction_test;
