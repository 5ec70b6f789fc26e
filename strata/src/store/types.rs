use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// Identifier of a record in a store.
///
/// Identifiers are issued by the store and are never reused by the
/// in-memory implementation, so a stale id can only ever point at nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordId(u64);

impl RecordId {
    pub const fn new(value: u64) -> Self {
        RecordId(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of an edge in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(u64);

impl EdgeId {
    pub const fn new(value: u64) -> Self {
        EdgeId(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl Display for EdgeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// The type label of an edge.
///
/// Edge types are compared by name. Extensions usually declare theirs as
/// constants:
///
/// ```rust
/// use strata::store::EdgeType;
///
/// const OWNS: EdgeType = EdgeType::from_static("OWNS");
/// assert_eq!(OWNS, EdgeType::new("OWNS"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeType(Cow<'static, str>);

impl EdgeType {
    pub const fn from_static(name: &'static str) -> Self {
        EdgeType(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        EdgeType(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for EdgeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which end of an edge a record sits on when listing its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Edges starting at the record.
    Outgoing,
    /// Edges ending at the record.
    Incoming,
    /// Edges in either direction.
    Both,
}

/// A typed, directed edge between two records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    id: EdgeId,
    from: RecordId,
    to: RecordId,
    edge_type: EdgeType,
}

impl Edge {
    pub fn new(id: EdgeId, from: RecordId, to: RecordId, edge_type: EdgeType) -> Self {
        Edge {
            id,
            from,
            to,
            edge_type,
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// The record the edge starts at.
    pub fn start(&self) -> RecordId {
        self.from
    }

    /// The record the edge points to.
    pub fn end(&self) -> RecordId {
        self.to
    }

    pub fn edge_type(&self) -> &EdgeType {
        &self.edge_type
    }

    /// Returns the end of the edge that is not `record`.
    pub fn other(&self, record: RecordId) -> RecordId {
        if self.from == record {
            self.to
        } else {
            self.from
        }
    }
}
