//! # Strata Spatial - R-tree Indexing for Strata
//!
//! This crate indexes records of a Strata store by their 2-D bounding box.
//! The R-tree is kept inside the store itself, so it shares the store's
//! transactions: an insertion that is rolled back leaves no trace in the
//! tree either.
//!
//! ## Features
//!
//! - **Store-Backed Nodes**: Index nodes are records linked by typed edges
//! - **Quadratic Split**: Classic Guttman splitting of overflowing nodes
//! - **Underflow Repair**: Removals collapse underfull subtrees and reinsert their records
//! - **Visitor Search**: Pruning pre-order traversal with pluggable visitors and filters
//! - **Bulk Operations**: Hilbert-ordered `add_all`, chunked and resumable `remove_all`
//! - **Validation**: Full structural check of a tree
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::common::Value;
//! use strata::store::memory::InMemoryGraphStore;
//! use strata::store::GraphStore;
//! use strata_spatial::decoder::BBoxPropertyDecoder;
//! use strata_spatial::progress::NullListener;
//! use strata_spatial::rtree::{RTreeConfig, RTreeIndex};
//! use strata_spatial::search::SearchIntersect;
//! use strata_spatial::Envelope;
//!
//! # fn main() -> strata_spatial::SpatialResult<()> {
//! let store = GraphStore::new(InMemoryGraphStore::default());
//!
//! let tx = store.begin_transaction()?;
//! let layer = store.create_record()?;
//! let mut parcels = Vec::new();
//! for i in 0..10 {
//!     let parcel = store.create_record()?;
//!     let x = i as f64;
//!     store.set_property(parcel, "bbox", Value::from(vec![x, 0.0, x + 0.5, 1.0]))?;
//!     parcels.push(parcel);
//! }
//! tx.commit()?;
//!
//! let config = RTreeConfig::builder().max_node_references(4).build()?;
//! let index = RTreeIndex::new(store, layer, BBoxPropertyDecoder::default(), config)?;
//! index.add_all(parcels, &NullListener)?;
//!
//! let hits = index.search_index(&SearchIntersect::new(Envelope::new(2.2, 3.7, 0.0, 1.0)))?;
//! assert_eq!(hits.len(), 2);
//! index.validate()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`envelope`] - Axis-aligned bounding boxes
//! - [`decoder`] - Mapping indexed records to envelopes
//! - [`rtree`] - The tree engine, its configuration and node storage
//! - [`search`] - Visitor protocol and stock search filters
//! - [`progress`] - Progress reporting for long operations
//! - [`hilbert`] - Hilbert curve ordering used by bulk insertion

pub mod decoder;
pub mod envelope;
pub mod error;
pub mod hilbert;
pub mod progress;
pub mod rtree;
pub mod search;

pub use decoder::{BBoxPropertyDecoder, EnvelopeDecoder, PointPropertyDecoder};
pub use envelope::Envelope;
pub use error::{SpatialError, SpatialResult};
pub use rtree::{RTreeConfig, RTreeIndex, RTreeStats};
pub use search::{SearchFilter, SpatialIndexVisitor};
