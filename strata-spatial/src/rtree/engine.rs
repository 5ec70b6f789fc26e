//! The store-backed R-tree engine.

use super::config::{check_fanout, is_balanced, RTreeConfig};
use super::constants::{
    KEY_MAX_NODE_REFERENCES, KEY_MIN_NODE_REFERENCES, KEY_TOTAL_GEOMETRY_COUNT, RTREE_CHILD,
    RTREE_METADATA, RTREE_PENDING_DELETE, RTREE_ROOT,
};
use super::index_node::IndexNodeRepository;
use super::split::{quadratic_split, SplitEntry};
use super::stats::{RTreeStatistics, RTreeStats};
use super::validate::TreeValidator;
use crate::decoder::EnvelopeDecoder;
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use crate::hilbert::{sort_by_hilbert, DEFAULT_HILBERT_ORDER};
use crate::progress::ProgressListener;
use crate::search::{SearchFilter, SearchFilterVisitor, SpatialIndexVisitor};
use std::iter::FusedIterator;
use std::sync::Arc;
use strata::common::Value;
use strata::errors::{ErrorKind, StrataError};
use strata::store::{Direction, GraphStore, RecordId};

/// An R-tree over the records of a [`GraphStore`].
///
/// The tree hangs off a caller-owned *layer* record: an `RTREE_ROOT` edge
/// leads to the root index node and an `RTREE_METADATA` edge to the record
/// holding the fanout and the cached payload count. Both are created lazily
/// by the first write.
///
/// Every mutating operation runs in a store transaction. When the caller
/// already holds one the operation joins it, so a caller-side rollback
/// undoes the tree changes too.
///
/// The handle is cheap to clone; clones share the same engine.
///
/// # Examples
///
/// ```rust
/// use strata::common::Value;
/// use strata::store::memory::InMemoryGraphStore;
/// use strata::store::GraphStore;
/// use strata_spatial::decoder::PointPropertyDecoder;
/// use strata_spatial::rtree::{RTreeConfig, RTreeIndex};
/// use strata_spatial::search::SearchCoveredBy;
/// use strata_spatial::Envelope;
///
/// # fn main() -> strata_spatial::SpatialResult<()> {
/// let store = GraphStore::new(InMemoryGraphStore::default());
/// let tx = store.begin_transaction()?;
/// let layer = store.create_record()?;
/// let point = store.create_record()?;
/// store.set_property(point, "x", Value::from(3.0))?;
/// store.set_property(point, "y", Value::from(4.0))?;
/// tx.commit()?;
///
/// let index = RTreeIndex::new(
///     store,
///     layer,
///     PointPropertyDecoder::default(),
///     RTreeConfig::default(),
/// )?;
/// index.add(point)?;
///
/// let hits = index.search_index(&SearchCoveredBy::new(Envelope::new(0.0, 5.0, 0.0, 5.0)))?;
/// assert_eq!(hits, vec![point]);
/// assert_eq!(index.count()?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RTreeIndex {
    inner: Arc<RTreeIndexInner>,
}

struct RTreeIndexInner {
    store: GraphStore,
    nodes: IndexNodeRepository,
    layer: RecordId,
    decoder: Arc<dyn EnvelopeDecoder>,
    max_node_references: usize,
    min_node_references: usize,
    batch_size: usize,
    stats: RTreeStatistics,
}

impl RTreeIndex {
    /// Opens the tree anchored at `layer`.
    ///
    /// When the layer already carries metadata, the persisted fanout is used
    /// and `config` only contributes the batch size.
    pub fn new<D>(
        store: GraphStore,
        layer: RecordId,
        decoder: D,
        config: RTreeConfig,
    ) -> SpatialResult<Self>
    where
        D: EnvelopeDecoder + 'static,
    {
        if !store.record_exists(layer)? {
            return Err(StrataError::new(
                &format!("Layer record {} does not exist", layer),
                ErrorKind::RecordNotFound,
            )
            .into());
        }

        let (max, min) = load_fanout(&store, layer, &config)?;
        log::debug!(
            "Opened R-tree on layer {} with fanout {}..{}",
            layer,
            min,
            max
        );

        Ok(RTreeIndex {
            inner: Arc::new(RTreeIndexInner {
                nodes: IndexNodeRepository::new(store.clone()),
                store,
                layer,
                decoder: Arc::new(decoder),
                max_node_references: max,
                min_node_references: min,
                batch_size: config.batch_size(),
                stats: RTreeStatistics::default(),
            }),
        })
    }

    /// The record this tree is anchored at.
    pub fn layer(&self) -> RecordId {
        self.inner.layer
    }

    /// The root index node, `None` until the first write.
    pub fn index_root(&self) -> SpatialResult<Option<RecordId>> {
        self.inner.root()
    }

    pub fn max_node_references(&self) -> usize {
        self.inner.max_node_references
    }

    pub fn min_node_references(&self) -> usize {
        self.inner.min_node_references
    }

    pub fn stats(&self) -> RTreeStats {
        self.inner.stats.snapshot()
    }

    /// Indexes `record` under the envelope its decoder reports.
    pub fn add(&self, record: RecordId) -> SpatialResult<()> {
        let inner = &self.inner;
        inner.store.with_transaction(|| -> SpatialResult<()> {
            let envelope = inner.decoder.decode(&inner.store, record)?;
            inner.insert(record, envelope)?;
            inner.bump_count(1)
        })
    }

    /// Indexes many records at once.
    ///
    /// Records are decoded up front, ordered along a Hilbert curve and
    /// inserted in transactions of `batch_size` records. A failing chunk is
    /// rolled back; chunks committed before it stay.
    pub fn add_all<I>(&self, records: I, progress: &dyn ProgressListener) -> SpatialResult<()>
    where
        I: IntoIterator<Item = RecordId>,
    {
        let inner = &self.inner;
        let mut entries = records
            .into_iter()
            .map(|record| -> SpatialResult<SplitEntry> {
                Ok((record, inner.decoder.decode(&inner.store, record)?))
            })
            .collect::<SpatialResult<Vec<_>>>()?;
        sort_by_hilbert(&mut entries, DEFAULT_HILBERT_ORDER);

        progress.begin(entries.len() as u64);
        for chunk in entries.chunks(inner.batch_size) {
            inner.store.with_transaction(|| -> SpatialResult<()> {
                for (record, envelope) in chunk {
                    inner.insert(*record, *envelope)?;
                }
                inner.bump_count(chunk.len() as i64)
            })?;
            progress.worked(chunk.len() as u64);
        }
        progress.done();
        Ok(())
    }

    /// Removes `record` from the tree, deleting the record too when
    /// `delete_payload` is set.
    ///
    /// Fails with [`SpatialError::NotIndexed`] when the record is not in any
    /// tree and with [`SpatialError::IndexedElsewhere`] when it belongs to
    /// another one.
    pub fn remove(&self, record: RecordId, delete_payload: bool) -> SpatialResult<()> {
        let inner = &self.inner;
        inner.store.with_transaction(|| -> SpatialResult<()> {
            inner.delete(record, delete_payload)?;
            inner.bump_count(-1)
        })
    }

    /// Like [`remove`](Self::remove), but reports an unindexed record as `false`.
    ///
    /// An unindexed record does not open a transaction, so it never marks an
    /// enclosing one rollback-only.
    pub fn try_remove(&self, record: RecordId, delete_payload: bool) -> SpatialResult<bool> {
        if self.inner.nodes.leaf_of(record)?.is_none() {
            return Ok(false);
        }
        self.remove(record, delete_payload)?;
        Ok(true)
    }

    /// Removes every entry and the whole tree structure.
    ///
    /// The tree is detached from its layer in one transaction first, so it
    /// is observed empty from then on. The detached nodes are then deleted
    /// one leaf per transaction. An interrupted run leaves the detached tree
    /// parked under an `RTREE_PENDING_DELETE` edge, and the next call picks
    /// it up again.
    pub fn remove_all(
        &self,
        delete_payloads: bool,
        progress: &dyn ProgressListener,
    ) -> SpatialResult<()> {
        let inner = &self.inner;
        inner
            .store
            .with_transaction(|| -> SpatialResult<()> { inner.detach_tree() })?;

        let mut detached = Vec::new();
        for root in inner.pending_roots()? {
            let leaves = inner.collect_leaves(root)?;
            detached.push((root, leaves));
        }
        progress.begin(detached.iter().map(|(_, leaves)| leaves.len() as u64).sum());

        for (root, leaves) in detached {
            inner.delete_detached_tree(root, leaves, delete_payloads, progress)?;
        }
        progress.done();
        Ok(())
    }

    /// Empties the tree and leaves a fresh root and metadata behind.
    pub fn clear(&self, progress: &dyn ProgressListener) -> SpatialResult<()> {
        self.remove_all(false, progress)?;
        let inner = &self.inner;
        inner.store.with_transaction(|| -> SpatialResult<()> {
            inner.ensure_root()?;
            Ok(())
        })?;
        log::debug!("Cleared R-tree on layer {}", inner.layer);
        Ok(())
    }

    /// Number of indexed payloads.
    ///
    /// Served from the cached count; a zero cache is treated as stale and
    /// recomputed with a full traversal, which is written back when nonzero.
    pub fn count(&self) -> SpatialResult<u64> {
        let inner = &self.inner;
        let metadata = inner.metadata()?;
        if let Some(metadata) = metadata {
            let cached = inner.cached_count(metadata)?;
            if cached > 0 {
                return Ok(cached);
            }
        }

        RTreeStatistics::increment(&inner.stats.count_recomputations, 1);
        let count = self.count_entries()?;
        if let (Some(metadata), true) = (metadata, count > 0) {
            inner.store.with_transaction(|| -> SpatialResult<()> {
                inner.write_count(metadata, count)
            })?;
        }
        Ok(count)
    }

    /// Recounts the payloads and refreshes the cached count.
    pub fn warm_up(&self) -> SpatialResult<u64> {
        let inner = &self.inner;
        let count = self.count_entries()?;
        if let Some(metadata) = inner.metadata()? {
            inner.store.with_transaction(|| -> SpatialResult<()> {
                inner.write_count(metadata, count)
            })?;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> SpatialResult<bool> {
        let inner = &self.inner;
        match inner.root()? {
            None => Ok(true),
            Some(root) => Ok(inner.nodes.bbox(root)?.is_none()),
        }
    }

    /// Checks whether `record` is a payload of this tree.
    pub fn is_indexed(&self, record: RecordId) -> SpatialResult<bool> {
        let inner = &self.inner;
        match inner.nodes.leaf_of(record)? {
            None => Ok(false),
            Some(edge) => {
                let owner = inner.nodes.root_of(edge.start())?;
                Ok(inner.root()? == Some(owner))
            }
        }
    }

    /// Box of the whole tree, `None` while it is empty.
    pub fn bounding_box(&self) -> SpatialResult<Option<Envelope>> {
        let inner = &self.inner;
        match inner.root()? {
            None => Ok(None),
            Some(root) => inner.nodes.bbox(root),
        }
    }

    /// Number of node levels, `0` without a root and `1` for a lone leaf root.
    pub fn depth(&self) -> SpatialResult<usize> {
        let inner = &self.inner;
        let Some(mut node) = inner.root()? else {
            return Ok(0);
        };
        let mut depth = 1;
        while let Some(child) = inner.nodes.children(node)?.first().copied() {
            depth += 1;
            node = child;
        }
        Ok(depth)
    }

    /// Walks the tree pre-order, handing every payload under a visited leaf
    /// to `visitor`.
    pub fn search<V>(&self, visitor: &mut V) -> SpatialResult<()>
    where
        V: SpatialIndexVisitor + ?Sized,
    {
        let inner = &self.inner;
        let Some(root) = inner.root()? else {
            return Ok(());
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            // only an empty root has no box
            let Some(bbox) = inner.nodes.bbox(node)? else {
                continue;
            };
            if !visitor.needs_to_visit(&bbox) {
                continue;
            }
            RTreeStatistics::increment(&inner.stats.nodes_visited, 1);

            let children = inner.nodes.children(node)?;
            if children.is_empty() {
                for payload in inner.nodes.references(node)? {
                    visitor.on_index_reference(payload)?;
                }
            } else {
                stack.extend(children);
            }
        }
        Ok(())
    }

    /// Same as [`search`](Self::search).
    pub fn visit<V>(&self, visitor: &mut V) -> SpatialResult<()>
    where
        V: SpatialIndexVisitor + ?Sized,
    {
        self.search(visitor)
    }

    /// Runs `filter` over the tree and returns the matching payloads.
    pub fn search_index<F>(&self, filter: &F) -> SpatialResult<Vec<RecordId>>
    where
        F: SearchFilter + ?Sized,
    {
        let inner = &self.inner;
        let mut visitor = SearchFilterVisitor::new(&inner.store, inner.decoder.as_ref(), filter);
        self.search(&mut visitor)?;
        Ok(visitor.into_results())
    }

    /// Lazily iterates over every payload of the tree.
    ///
    /// Nodes are read as the iterator advances. Each call starts a new walk
    /// from the current root.
    pub fn all_indexed_records(&self) -> IndexedRecords {
        IndexedRecords {
            index: self.clone(),
            stack: Vec::new(),
            pending: Vec::new(),
            started: false,
            finished: false,
        }
    }

    /// Walks the whole tree and reports the first structural defect found.
    pub fn validate(&self) -> SpatialResult<()> {
        let inner = &self.inner;
        let cached = match inner.metadata()? {
            Some(metadata) => inner.cached_count(metadata)?,
            None => 0,
        };
        let validator = TreeValidator::new(
            &inner.store,
            &inner.nodes,
            inner.decoder.as_ref(),
            inner.max_node_references,
            inner.min_node_references,
        );
        validator.validate(inner.root()?, cached)
    }

    fn count_entries(&self) -> SpatialResult<u64> {
        let mut counter = EntryCounter::default();
        self.search(&mut counter)?;
        Ok(counter.count)
    }
}

impl std::fmt::Debug for RTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RTreeIndex")
            .field("layer", &self.inner.layer)
            .field("max_node_references", &self.inner.max_node_references)
            .field("min_node_references", &self.inner.min_node_references)
            .field("batch_size", &self.inner.batch_size)
            .finish()
    }
}

impl RTreeIndexInner {
    fn root(&self) -> SpatialResult<Option<RecordId>> {
        Ok(self
            .store
            .single_edge(self.layer, &RTREE_ROOT, Direction::Outgoing)?
            .map(|edge| edge.end()))
    }

    fn metadata(&self) -> SpatialResult<Option<RecordId>> {
        Ok(self
            .store
            .single_edge(self.layer, &RTREE_METADATA, Direction::Outgoing)?
            .map(|edge| edge.end()))
    }

    /// Returns the root, creating it and the metadata record when missing.
    fn ensure_root(&self) -> SpatialResult<RecordId> {
        if self.metadata()?.is_none() {
            let metadata = self.store.create_record()?;
            self.store.set_property(
                metadata,
                KEY_MAX_NODE_REFERENCES,
                Value::from(self.max_node_references as i64),
            )?;
            self.store.set_property(
                metadata,
                KEY_MIN_NODE_REFERENCES,
                Value::from(self.min_node_references as i64),
            )?;
            self.write_count(metadata, 0)?;
            self.store.create_edge(self.layer, metadata, &RTREE_METADATA)?;
        }

        match self.root()? {
            Some(root) => Ok(root),
            None => {
                let root = self.nodes.create_node()?;
                self.store.create_edge(self.layer, root, &RTREE_ROOT)?;
                Ok(root)
            }
        }
    }

    fn set_root(&self, root: RecordId) -> SpatialResult<()> {
        for edge in self
            .store
            .edges_of(self.layer, &RTREE_ROOT, Direction::Outgoing)?
        {
            self.store.delete_edge(edge.id())?;
        }
        self.store.create_edge(self.layer, root, &RTREE_ROOT)?;
        Ok(())
    }

    fn cached_count(&self, metadata: RecordId) -> SpatialResult<u64> {
        Ok(self
            .store
            .get_property(metadata, KEY_TOTAL_GEOMETRY_COUNT)?
            .and_then(|value| value.as_i64())
            .map_or(0, |count| count.max(0) as u64))
    }

    fn write_count(&self, metadata: RecordId, count: u64) -> SpatialResult<()> {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        self.store
            .set_property(metadata, KEY_TOTAL_GEOMETRY_COUNT, Value::from(count))?;
        Ok(())
    }

    /// Adjusts a valid cached count. A zero (stale) count is left for the
    /// next `count()` to recompute.
    fn bump_count(&self, delta: i64) -> SpatialResult<()> {
        let Some(metadata) = self.metadata()? else {
            return Ok(());
        };
        let cached = self.cached_count(metadata)?;
        if cached > 0 {
            let updated = (cached as i64).saturating_add(delta).max(0) as u64;
            self.write_count(metadata, updated)?;
        }
        Ok(())
    }

    fn entry_envelope(&self, entry: RecordId, leaf: bool) -> SpatialResult<Envelope> {
        if leaf {
            self.decoder.decode(&self.store, entry)
        } else {
            self.nodes.bbox(entry)?.ok_or_else(|| {
                SpatialError::InvariantViolation(format!("index node {} has no bbox", entry))
            })
        }
    }

    /// Exact union of a node's entries, `None` when it has none.
    fn entries_envelope(&self, node: RecordId) -> SpatialResult<Option<Envelope>> {
        let children = self.nodes.children(node)?;
        let (entries, leaf) = if children.is_empty() {
            (self.nodes.references(node)?, true)
        } else {
            (children, false)
        };

        let mut envelope: Option<Envelope> = None;
        for entry in entries {
            let entry_envelope = self.entry_envelope(entry, leaf)?;
            match envelope.as_mut() {
                Some(envelope) => envelope.expand_to_include(&entry_envelope),
                None => envelope = Some(entry_envelope),
            }
        }
        Ok(envelope)
    }

    fn insert(&self, record: RecordId, envelope: Envelope) -> SpatialResult<()> {
        if let Some(edge) = self.nodes.leaf_of(record)? {
            let owner = self.nodes.root_of(edge.start())?;
            return if self.root()? == Some(owner) {
                Err(SpatialError::AlreadyIndexed(record))
            } else {
                Err(SpatialError::IndexedElsewhere(record))
            };
        }

        let root = self.ensure_root()?;
        let leaf = self.choose_leaf(root, &envelope)?;
        self.nodes.attach_reference(leaf, record)?;

        if self.nodes.child_count(leaf)? > self.max_node_references {
            self.split_upward(leaf)
        } else {
            self.expand_upward(leaf, &envelope)
        }
    }

    fn choose_leaf(&self, root: RecordId, envelope: &Envelope) -> SpatialResult<RecordId> {
        let mut node = root;
        loop {
            let children = self.nodes.children(node)?;
            if children.is_empty() {
                return Ok(node);
            }
            node = self.choose_subtree(node, children, envelope)?;
        }
    }

    /// Picks the child to descend into: the smallest one already containing
    /// the envelope, else the one needing the least enlargement.
    fn choose_subtree(
        &self,
        parent: RecordId,
        children: Vec<RecordId>,
        envelope: &Envelope,
    ) -> SpatialResult<RecordId> {
        let mut containing: Option<(RecordId, f64)> = None;
        let mut enlarging: Option<(RecordId, f64, f64)> = None;

        for child in children {
            let bbox = self.entry_envelope(child, false)?;
            let area = bbox.area();
            if bbox.contains(envelope) {
                if containing.map_or(true, |(_, best)| area < best) {
                    containing = Some((child, area));
                }
                continue;
            }

            let enlargement = bbox.enlargement(envelope);
            let enlarged_area = area + enlargement;
            let better = match enlarging {
                None => true,
                Some((_, best_enlargement, best_area)) => {
                    enlargement < best_enlargement
                        || (enlargement == best_enlargement && enlarged_area < best_area)
                }
            };
            if better {
                enlarging = Some((child, enlargement, enlarged_area));
            }
        }

        containing
            .map(|(child, _)| child)
            .or(enlarging.map(|(child, _, _)| child))
            .ok_or_else(|| {
                SpatialError::InvariantViolation(format!(
                    "no subtree of index node {} can take {}",
                    parent, envelope
                ))
            })
    }

    /// Grows boxes from `node` upward until one already covers `envelope`.
    fn expand_upward(&self, node: RecordId, envelope: &Envelope) -> SpatialResult<()> {
        let mut current = Some(node);
        while let Some(node) = current {
            let expanded = match self.nodes.bbox(node)? {
                Some(bbox) => Envelope::union(&bbox, envelope),
                None => *envelope,
            };
            if !self.nodes.replace_bbox(node, Some(&expanded))? {
                break;
            }
            current = self.nodes.parent(node)?;
        }
        Ok(())
    }

    /// Recomputes boxes exactly from `node` upward until one is unchanged.
    fn recompute_upward(&self, node: RecordId) -> SpatialResult<()> {
        let mut current = Some(node);
        while let Some(node) = current {
            let exact = self.entries_envelope(node)?;
            if !self.nodes.replace_bbox(node, exact.as_ref())? {
                break;
            }
            current = self.nodes.parent(node)?;
        }
        Ok(())
    }

    /// Splits the overflowing `node`, then any ancestor the split overflows.
    fn split_upward(&self, node: RecordId) -> SpatialResult<()> {
        let mut node = node;
        loop {
            let sibling = self.split(node)?;
            match self.nodes.parent(node)? {
                None => return self.grow_root(node, sibling),
                Some(parent) => {
                    self.nodes.attach_child(parent, sibling)?;
                    if self.nodes.child_count(parent)? > self.max_node_references {
                        node = parent;
                    } else {
                        return self.recompute_upward(parent);
                    }
                }
            }
        }
    }

    /// Spreads the entries of `node` over itself and a new sibling, which
    /// is returned unattached.
    fn split(&self, node: RecordId) -> SpatialResult<RecordId> {
        let leaf = self.nodes.is_leaf(node)?;
        let mut entries = Vec::new();
        for entry in self.nodes.detach_all(node)? {
            entries.push((entry, self.entry_envelope(entry, leaf)?));
        }

        let (group1, group2) = quadratic_split(entries, self.min_node_references)?;

        self.nodes.clear_bbox(node)?;
        self.attach_group(node, &group1.entries, leaf)?;
        self.nodes.set_bbox(node, &group1.envelope)?;

        let sibling = self.nodes.create_node()?;
        self.attach_group(sibling, &group2.entries, leaf)?;
        self.nodes.set_bbox(sibling, &group2.envelope)?;

        RTreeStatistics::increment(&self.stats.splits, 1);
        Ok(sibling)
    }

    fn attach_group(&self, node: RecordId, entries: &[SplitEntry], leaf: bool) -> SpatialResult<()> {
        for (entry, _) in entries {
            if leaf {
                self.nodes.attach_reference(node, *entry)?;
            } else {
                self.nodes.attach_child(node, *entry)?;
            }
        }
        Ok(())
    }

    fn grow_root(&self, old_root: RecordId, sibling: RecordId) -> SpatialResult<()> {
        let root = self.nodes.create_node()?;
        self.nodes.attach_child(root, old_root)?;
        self.nodes.attach_child(root, sibling)?;
        if let Some(envelope) = self.entries_envelope(root)? {
            self.nodes.set_bbox(root, &envelope)?;
        }
        self.set_root(root)?;
        log::debug!(
            "Split root {} of layer {}, new root is {}",
            old_root,
            self.layer,
            root
        );
        Ok(())
    }

    fn delete(&self, record: RecordId, delete_payload: bool) -> SpatialResult<()> {
        let edge = self
            .nodes
            .leaf_of(record)?
            .ok_or(SpatialError::NotIndexed(record))?;
        let leaf = edge.start();
        if self.root()? != Some(self.nodes.root_of(leaf)?) {
            return Err(SpatialError::IndexedElsewhere(record));
        }

        self.store.delete_edge(edge.id())?;
        if delete_payload {
            self.store.delete_record(record)?;
        }

        let underflow = self.nodes.parent(leaf)?.is_some()
            && self.nodes.child_count(leaf)? < self.min_node_references;
        if underflow {
            self.collapse(leaf)
        } else {
            self.recompute_upward(leaf)
        }
    }

    /// Removes the highest subtree the underflow of `leaf` propagates to and
    /// reinserts its payloads.
    fn collapse(&self, leaf: RecordId) -> SpatialResult<()> {
        let mut top = leaf;
        let mut parent = self.nodes.parent(top)?;
        while let Some(candidate) = parent {
            let grandparent = self.nodes.parent(candidate)?;
            if grandparent.is_none()
                || self.nodes.child_count(candidate)? != self.min_node_references
            {
                break;
            }
            top = candidate;
            parent = grandparent;
        }
        let Some(parent) = parent else {
            return Err(SpatialError::InvariantViolation(format!(
                "underflowing index node {} has no parent",
                top
            )));
        };

        let orphans = self.dismantle(top)?;
        self.recompute_upward(parent)?;

        for orphan in &orphans {
            let envelope = self.decoder.decode(&self.store, *orphan)?;
            self.insert(*orphan, envelope)?;
        }

        RTreeStatistics::increment(&self.stats.collapses, 1);
        RTreeStatistics::increment(&self.stats.reinserted_records, orphans.len() as u64);
        log::debug!(
            "Collapsed subtree {} of layer {}, reinserted {} records",
            top,
            self.layer,
            orphans.len()
        );
        Ok(())
    }

    /// Deletes `top` and everything under it, returning the unlinked payloads.
    fn dismantle(&self, top: RecordId) -> SpatialResult<Vec<RecordId>> {
        self.nodes.detach_from_parent(top)?;

        let mut payloads = Vec::new();
        let mut stack = vec![top];
        while let Some(node) = stack.pop() {
            stack.extend(self.nodes.detach_children(node)?);
            payloads.extend(self.nodes.detach_references(node)?);
            self.nodes.delete(node)?;
        }
        Ok(payloads)
    }

    /// Parks the root under a pending-delete edge and drops the metadata.
    fn detach_tree(&self) -> SpatialResult<()> {
        for edge in self
            .store
            .edges_of(self.layer, &RTREE_ROOT, Direction::Outgoing)?
        {
            self.store.delete_edge(edge.id())?;
            self.store
                .create_edge(self.layer, edge.end(), &RTREE_PENDING_DELETE)?;
            log::debug!("Detached root {} of layer {}", edge.end(), self.layer);
        }

        for edge in self
            .store
            .edges_of(self.layer, &RTREE_METADATA, Direction::Outgoing)?
        {
            self.store.delete_edge(edge.id())?;
            self.store.delete_record(edge.end())?;
        }
        Ok(())
    }

    fn pending_roots(&self) -> SpatialResult<Vec<RecordId>> {
        Ok(self
            .store
            .edges_of(self.layer, &RTREE_PENDING_DELETE, Direction::Outgoing)?
            .into_iter()
            .map(|edge| edge.end())
            .collect())
    }

    fn delete_detached_tree(
        &self,
        root: RecordId,
        leaves: Vec<RecordId>,
        delete_payloads: bool,
        progress: &dyn ProgressListener,
    ) -> SpatialResult<()> {
        for leaf in leaves {
            self.store.with_transaction(|| -> SpatialResult<()> {
                for payload in self.nodes.detach_references(leaf)? {
                    if delete_payloads {
                        self.store.delete_record(payload)?;
                    }
                }
                self.nodes.detach_from_parent(leaf)?;
                self.remove_pending_edges(leaf)?;
                self.nodes.delete(leaf)
            })?;
            progress.worked(1);
        }

        self.store.with_transaction(|| -> SpatialResult<()> {
            self.remove_pending_edges(root)?;
            if self.store.record_exists(root)? {
                self.dismantle(root)?;
            }
            Ok(())
        })?;
        log::debug!("Deleted detached tree {} of layer {}", root, self.layer);
        Ok(())
    }

    fn remove_pending_edges(&self, node: RecordId) -> SpatialResult<()> {
        for edge in self
            .store
            .edges_of(node, &RTREE_PENDING_DELETE, Direction::Incoming)?
        {
            self.store.delete_edge(edge.id())?;
        }
        Ok(())
    }

    /// Nodes without children under `root`, childless internal nodes included.
    fn collect_leaves(&self, root: RecordId) -> SpatialResult<Vec<RecordId>> {
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let children = self.nodes.children(node)?;
            if children.is_empty() {
                leaves.push(node);
            } else {
                stack.extend(children);
            }
        }
        Ok(leaves)
    }
}

/// Reads the fanout persisted for `layer`, falling back to `config` for a
/// tree that has never been written.
fn load_fanout(
    store: &GraphStore,
    layer: RecordId,
    config: &RTreeConfig,
) -> SpatialResult<(usize, usize)> {
    let Some(edge) = store.single_edge(layer, &RTREE_METADATA, Direction::Outgoing)? else {
        return Ok((config.max_node_references(), config.min_node_references()));
    };

    let metadata = edge.end();
    let max = read_fanout(store, metadata, KEY_MAX_NODE_REFERENCES)?;
    let min = read_fanout(store, metadata, KEY_MIN_NODE_REFERENCES)?;
    check_fanout(max, min)?;

    if max != config.max_node_references() || min != config.min_node_references() {
        log::warn!(
            "Layer {} was built with fanout {}..{}, ignoring configured {}..{}",
            layer,
            min,
            max,
            config.min_node_references(),
            config.max_node_references()
        );
    }
    if !is_balanced(max, min) {
        log::debug!("Layer {} uses an unbalanced fanout", layer);
    }
    Ok((max, min))
}

fn read_fanout(store: &GraphStore, metadata: RecordId, key: &str) -> SpatialResult<usize> {
    store
        .get_property(metadata, key)?
        .and_then(|value| value.as_i64())
        .and_then(|value| usize::try_from(value).ok())
        .ok_or_else(|| {
            SpatialError::Configuration(format!(
                "metadata record {} has no valid '{}'",
                metadata, key
            ))
        })
}

#[derive(Default)]
struct EntryCounter {
    count: u64,
}

impl SpatialIndexVisitor for EntryCounter {
    fn needs_to_visit(&mut self, _envelope: &Envelope) -> bool {
        true
    }

    fn on_index_reference(&mut self, _record: RecordId) -> SpatialResult<()> {
        self.count += 1;
        Ok(())
    }
}

/// Lazy iterator over the payloads of an [`RTreeIndex`].
///
/// Yields an error once and then ends if the store fails mid-walk.
pub struct IndexedRecords {
    index: RTreeIndex,
    stack: Vec<RecordId>,
    pending: Vec<RecordId>,
    started: bool,
    finished: bool,
}

impl IndexedRecords {
    fn advance(&mut self) -> SpatialResult<Option<RecordId>> {
        let inner = &self.index.inner;
        if !self.started {
            self.started = true;
            if let Some(root) = inner.root()? {
                self.stack.push(root);
            }
        }

        loop {
            if let Some(record) = self.pending.pop() {
                return Ok(Some(record));
            }
            let Some(node) = self.stack.pop() else {
                return Ok(None);
            };
            let children = inner.nodes.children(node)?;
            if children.is_empty() {
                self.pending.extend(inner.nodes.references(node)?);
            } else {
                self.stack.extend(children);
            }
        }
    }
}

impl Iterator for IndexedRecords {
    type Item = SpatialResult<RecordId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for IndexedRecords {}
