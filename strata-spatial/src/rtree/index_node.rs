//! Index nodes materialized as store records.
//!
//! An index node is a plain record carrying a cached `bbox` property. An
//! internal node points at its children through outgoing `RTREE_CHILD` edges,
//! a leaf points at its payloads through outgoing `RTREE_REFERENCE` edges. A
//! node without outgoing `RTREE_CHILD` edges is a leaf, so an empty root is a
//! leaf too.

use super::constants::{INDEX_PROP_BBOX, RTREE_CHILD, RTREE_REFERENCE};
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use strata::common::Value;
use strata::store::{Direction, Edge, EdgeType, GraphStore, RecordId};

/// Reads and writes the structure of index nodes in a [`GraphStore`].
///
/// The repository knows nothing about fanout or balancing; it only maps the
/// node vocabulary onto records, edges and properties. Writes must happen
/// inside a transaction.
#[derive(Debug, Clone)]
pub struct IndexNodeRepository {
    store: GraphStore,
}

impl IndexNodeRepository {
    pub fn new(store: GraphStore) -> Self {
        IndexNodeRepository { store }
    }

    /// Creates a fresh node without box or entries.
    pub fn create_node(&self) -> SpatialResult<RecordId> {
        Ok(self.store.create_record()?)
    }

    /// Deletes a node record. All of its edges must be gone already.
    pub fn delete(&self, node: RecordId) -> SpatialResult<()> {
        Ok(self.store.delete_record(node)?)
    }

    /// Cached box of a node, `None` while the node holds no entries.
    pub fn bbox(&self, node: RecordId) -> SpatialResult<Option<Envelope>> {
        match self.store.get_property(node, INDEX_PROP_BBOX)? {
            None => Ok(None),
            Some(value) => value
                .as_f64_array()
                .and_then(Envelope::from_bbox_array)
                .map(Some)
                .ok_or_else(|| {
                    SpatialError::InvariantViolation(format!(
                        "index node {} has a malformed bbox: {}",
                        node,
                        value.type_name()
                    ))
                }),
        }
    }

    pub fn set_bbox(&self, node: RecordId, envelope: &Envelope) -> SpatialResult<()> {
        let bbox = envelope.to_bbox_array().to_vec();
        Ok(self
            .store
            .set_property(node, INDEX_PROP_BBOX, Value::from(bbox))?)
    }

    pub fn clear_bbox(&self, node: RecordId) -> SpatialResult<()> {
        self.store.remove_property(node, INDEX_PROP_BBOX)?;
        Ok(())
    }

    /// Writes `envelope` as the node's box, or removes the box for `None`.
    ///
    /// Returns whether the stored box changed.
    pub fn replace_bbox(&self, node: RecordId, envelope: Option<&Envelope>) -> SpatialResult<bool> {
        let current = self.bbox(node)?;
        if current.as_ref() == envelope {
            return Ok(false);
        }
        match envelope {
            Some(envelope) => self.set_bbox(node, envelope)?,
            None => self.clear_bbox(node)?,
        }
        Ok(true)
    }

    /// Child index nodes of an internal node.
    pub fn children(&self, node: RecordId) -> SpatialResult<Vec<RecordId>> {
        self.targets(node, &RTREE_CHILD)
    }

    /// Payload records referenced by a leaf.
    pub fn references(&self, node: RecordId) -> SpatialResult<Vec<RecordId>> {
        self.targets(node, &RTREE_REFERENCE)
    }

    pub fn is_leaf(&self, node: RecordId) -> SpatialResult<bool> {
        Ok(!self
            .store
            .has_edge(node, &RTREE_CHILD, Direction::Outgoing)?)
    }

    /// Number of entries: children of an internal node, references of a leaf.
    pub fn child_count(&self, node: RecordId) -> SpatialResult<usize> {
        let children = self
            .store
            .edges_of(node, &RTREE_CHILD, Direction::Outgoing)?
            .len();
        if children > 0 {
            return Ok(children);
        }
        Ok(self
            .store
            .edges_of(node, &RTREE_REFERENCE, Direction::Outgoing)?
            .len())
    }

    pub fn parent(&self, node: RecordId) -> SpatialResult<Option<RecordId>> {
        Ok(self
            .store
            .single_edge(node, &RTREE_CHILD, Direction::Incoming)?
            .map(|edge| edge.start()))
    }

    /// The `RTREE_REFERENCE` edge pointing at a payload, if it is indexed.
    pub fn leaf_of(&self, payload: RecordId) -> SpatialResult<Option<Edge>> {
        Ok(self
            .store
            .single_edge(payload, &RTREE_REFERENCE, Direction::Incoming)?)
    }

    /// Follows parent links up to the topmost node.
    pub fn root_of(&self, node: RecordId) -> SpatialResult<RecordId> {
        let mut current = node;
        while let Some(parent) = self.parent(current)? {
            current = parent;
        }
        Ok(current)
    }

    pub fn attach_child(&self, parent: RecordId, child: RecordId) -> SpatialResult<()> {
        self.store.create_edge(parent, child, &RTREE_CHILD)?;
        Ok(())
    }

    pub fn attach_reference(&self, leaf: RecordId, payload: RecordId) -> SpatialResult<()> {
        self.store.create_edge(leaf, payload, &RTREE_REFERENCE)?;
        Ok(())
    }

    /// Unlinks every child of `node` and returns them.
    pub fn detach_children(&self, node: RecordId) -> SpatialResult<Vec<RecordId>> {
        self.detach(node, &RTREE_CHILD)
    }

    /// Unlinks every payload of `node` and returns them.
    pub fn detach_references(&self, node: RecordId) -> SpatialResult<Vec<RecordId>> {
        self.detach(node, &RTREE_REFERENCE)
    }

    /// Unlinks every entry of `node`, whichever kind it holds.
    pub fn detach_all(&self, node: RecordId) -> SpatialResult<Vec<RecordId>> {
        let mut entries = self.detach_children(node)?;
        entries.extend(self.detach_references(node)?);
        Ok(entries)
    }

    /// Removes the edge linking `node` to its parent, if any.
    pub fn detach_from_parent(&self, node: RecordId) -> SpatialResult<()> {
        for edge in self
            .store
            .edges_of(node, &RTREE_CHILD, Direction::Incoming)?
        {
            self.store.delete_edge(edge.id())?;
        }
        Ok(())
    }

    fn targets(&self, node: RecordId, edge_type: &EdgeType) -> SpatialResult<Vec<RecordId>> {
        Ok(self
            .store
            .edges_of(node, edge_type, Direction::Outgoing)?
            .into_iter()
            .map(|edge| edge.end())
            .collect())
    }

    fn detach(&self, node: RecordId, edge_type: &EdgeType) -> SpatialResult<Vec<RecordId>> {
        let edges = self.store.edges_of(node, edge_type, Direction::Outgoing)?;
        let mut targets = Vec::with_capacity(edges.len());
        for edge in edges {
            self.store.delete_edge(edge.id())?;
            targets.push(edge.end());
        }
        Ok(targets)
    }
}
