//! # Strata - Embedded Record/Edge Store
//!
//! Strata is a small embedded store of opaque records connected by typed,
//! directed edges. Each record carries a property bag, and every write runs
//! inside a nestable transaction scope. Extension crates, such as the
//! `strata-spatial` R-tree, build their persistent structures on top of it.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::common::Value;
//! use strata::store::memory::InMemoryGraphStore;
//! use strata::store::{Direction, EdgeType, GraphStore};
//!
//! # fn main() -> strata::errors::StrataResult<()> {
//! const OWNS: EdgeType = EdgeType::from_static("OWNS");
//!
//! let store = GraphStore::new(InMemoryGraphStore::default());
//!
//! let tx = store.begin_transaction()?;
//! let owner = store.create_record()?;
//! let item = store.create_record()?;
//! store.set_property(item, "name", Value::from("lamp"))?;
//! store.create_edge(owner, item, &OWNS)?;
//! tx.commit()?;
//!
//! let owned = store.edges_of(owner, &OWNS, Direction::Outgoing)?;
//! assert_eq!(owned[0].end(), item);
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Pattern
//!
//! Public handles such as [`store::GraphStore`] and
//! [`store::memory::InMemoryGraphStore`] wrap their state in an `Arc`, so
//! clones are cheap and share the same underlying store.
//!
//! ## Module Organization
//!
//! - [`common`] - Property values and shared lock helpers
//! - [`errors`] - Error types and result definitions
//! - [`store`] - Store contract, transaction guard and in-memory provider

pub mod common;
pub mod errors;
pub mod store;
