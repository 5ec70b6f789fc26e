//! Structural checks over a whole tree.

use super::config::is_balanced;
use super::constants::{RTREE_CHILD, RTREE_REFERENCE};
use super::index_node::IndexNodeRepository;
use crate::decoder::EnvelopeDecoder;
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use strata::store::{Direction, GraphStore, RecordId};

/// Walks a tree and reports the first violated structural invariant.
pub(crate) struct TreeValidator<'a> {
    store: &'a GraphStore,
    nodes: &'a IndexNodeRepository,
    decoder: &'a dyn EnvelopeDecoder,
    max_node_references: usize,
    min_node_references: usize,
}

impl<'a> TreeValidator<'a> {
    pub(crate) fn new(
        store: &'a GraphStore,
        nodes: &'a IndexNodeRepository,
        decoder: &'a dyn EnvelopeDecoder,
        max_node_references: usize,
        min_node_references: usize,
    ) -> Self {
        TreeValidator {
            store,
            nodes,
            decoder,
            max_node_references,
            min_node_references,
        }
    }

    /// Validates the tree under `root`. A nonzero `cached_count` must equal
    /// the number of payloads found.
    pub(crate) fn validate(&self, root: Option<RecordId>, cached_count: u64) -> SpatialResult<()> {
        let Some(root) = root else {
            return Ok(());
        };
        if self.nodes.parent(root)?.is_some() {
            return Err(violation(format!("root {} has a parent", root)));
        }

        let check_min = is_balanced(self.max_node_references, self.min_node_references);
        let mut leaf_depth: Option<usize> = None;
        let mut payloads = 0u64;
        let mut stack = vec![(root, 1usize)];

        while let Some((node, depth)) = stack.pop() {
            let children = self.nodes.children(node)?;
            let references = self.nodes.references(node)?;
            if !children.is_empty() && !references.is_empty() {
                return Err(violation(format!(
                    "index node {} has both children and references",
                    node
                )));
            }

            let entries = children.len() + references.len();
            if entries > self.max_node_references {
                return Err(violation(format!(
                    "index node {} has {} entries, more than {}",
                    node, entries, self.max_node_references
                )));
            }
            if check_min && node != root && entries < self.min_node_references {
                return Err(violation(format!(
                    "index node {} has {} entries, fewer than {}",
                    node, entries, self.min_node_references
                )));
            }

            let expected = if children.is_empty() {
                self.check_leaf(node, depth, &references, &mut leaf_depth)?;
                payloads += references.len() as u64;
                self.union_of_payloads(&references)?
            } else {
                for child in &children {
                    self.check_single_parent(*child)?;
                    stack.push((*child, depth + 1));
                }
                self.union_of_nodes(&children)?
            };

            let stored = self.nodes.bbox(node)?;
            if stored != expected {
                return Err(violation(format!(
                    "index node {} has bbox {:?}, its entries span {:?}",
                    node, stored, expected
                )));
            }
        }

        if cached_count > 0 && cached_count != payloads {
            return Err(violation(format!(
                "cached count is {} but the tree holds {} records",
                cached_count, payloads
            )));
        }
        Ok(())
    }

    fn check_leaf(
        &self,
        node: RecordId,
        depth: usize,
        references: &[RecordId],
        leaf_depth: &mut Option<usize>,
    ) -> SpatialResult<()> {
        match *leaf_depth {
            None => *leaf_depth = Some(depth),
            Some(expected) if expected != depth => {
                return Err(violation(format!(
                    "leaf {} sits at depth {}, other leaves at {}",
                    node, depth, expected
                )));
            }
            Some(_) => {}
        }

        for payload in references {
            let owners = self
                .store
                .edges_of(*payload, &RTREE_REFERENCE, Direction::Incoming)?
                .len();
            if owners != 1 {
                return Err(violation(format!(
                    "record {} is referenced by {} leaves",
                    payload, owners
                )));
            }
        }
        Ok(())
    }

    fn check_single_parent(&self, child: RecordId) -> SpatialResult<()> {
        let parents = self
            .store
            .edges_of(child, &RTREE_CHILD, Direction::Incoming)?
            .len();
        if parents != 1 {
            return Err(violation(format!(
                "index node {} has {} parents",
                child, parents
            )));
        }
        Ok(())
    }

    fn union_of_nodes(&self, children: &[RecordId]) -> SpatialResult<Option<Envelope>> {
        let mut boxes = Vec::with_capacity(children.len());
        for child in children {
            let bbox = self
                .nodes
                .bbox(*child)?
                .ok_or_else(|| violation(format!("index node {} has no bbox", child)))?;
            boxes.push(bbox);
        }
        Ok(Envelope::union_all(&boxes))
    }

    fn union_of_payloads(&self, references: &[RecordId]) -> SpatialResult<Option<Envelope>> {
        let mut boxes = Vec::with_capacity(references.len());
        for payload in references {
            boxes.push(self.decoder.decode(self.store, *payload)?);
        }
        Ok(Envelope::union_all(&boxes))
    }
}

fn violation(message: String) -> SpatialError {
    SpatialError::InvariantViolation(message)
}
