//! Search protocol of the R-tree.
//!
//! The engine walks the tree pre-order and asks a [`SpatialIndexVisitor`]
//! whether each node's box is worth descending into. Every payload under a
//! visited leaf is handed to the visitor unfiltered; payload level filtering
//! is layered on top by [`SearchFilter`] through [`SearchFilterVisitor`].

use crate::decoder::EnvelopeDecoder;
use crate::envelope::Envelope;
use crate::error::SpatialResult;
use strata::store::{GraphStore, RecordId};

/// Receives a pre-order traversal of the tree.
pub trait SpatialIndexVisitor {
    /// Called once per index node, root included, before its children.
    /// Returning `false` prunes the whole subtree.
    fn needs_to_visit(&mut self, envelope: &Envelope) -> bool;

    /// Called for every payload referenced by a visited leaf.
    fn on_index_reference(&mut self, record: RecordId) -> SpatialResult<()>;
}

/// Query predicate over envelopes.
///
/// `needs_to_visit` decides on node boxes, `matches` on the decoded envelope
/// of a single payload. `needs_to_visit` must hold for every box that can
/// contain a matching payload.
pub trait SearchFilter {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool;

    fn matches(&self, envelope: &Envelope) -> bool;
}

/// Matches every payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchAll;

impl SearchFilter for SearchAll {
    fn needs_to_visit(&self, _envelope: &Envelope) -> bool {
        true
    }

    fn matches(&self, _envelope: &Envelope) -> bool {
        true
    }
}

/// Matches payloads lying entirely inside the query envelope.
#[derive(Debug, Clone, Copy)]
pub struct SearchCoveredBy {
    query: Envelope,
}

impl SearchCoveredBy {
    pub fn new(query: Envelope) -> Self {
        SearchCoveredBy { query }
    }
}

impl SearchFilter for SearchCoveredBy {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool {
        self.query.intersects(envelope)
    }

    fn matches(&self, envelope: &Envelope) -> bool {
        self.query.contains(envelope)
    }
}

/// Matches payloads sharing at least one point with the query envelope.
#[derive(Debug, Clone, Copy)]
pub struct SearchIntersect {
    query: Envelope,
}

impl SearchIntersect {
    pub fn new(query: Envelope) -> Self {
        SearchIntersect { query }
    }
}

impl SearchFilter for SearchIntersect {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool {
        self.query.intersects(envelope)
    }

    fn matches(&self, envelope: &Envelope) -> bool {
        self.query.intersects(envelope)
    }
}

/// Matches payloads whose envelope equals the query envelope.
#[derive(Debug, Clone, Copy)]
pub struct SearchEqualEnvelopes {
    query: Envelope,
}

impl SearchEqualEnvelopes {
    pub fn new(query: Envelope) -> Self {
        SearchEqualEnvelopes { query }
    }
}

impl SearchFilter for SearchEqualEnvelopes {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool {
        envelope.contains(&self.query)
    }

    fn matches(&self, envelope: &Envelope) -> bool {
        *envelope == self.query
    }
}

/// Matches payloads whose envelope contains the query envelope.
#[derive(Debug, Clone, Copy)]
pub struct SearchContains {
    query: Envelope,
}

impl SearchContains {
    pub fn new(query: Envelope) -> Self {
        SearchContains { query }
    }
}

impl SearchFilter for SearchContains {
    fn needs_to_visit(&self, envelope: &Envelope) -> bool {
        envelope.contains(&self.query)
    }

    fn matches(&self, envelope: &Envelope) -> bool {
        envelope.contains(&self.query)
    }
}

/// Adapts a [`SearchFilter`] to the visitor protocol by decoding every
/// reported payload and keeping the matching ones.
pub struct SearchFilterVisitor<'a, F: SearchFilter + ?Sized> {
    store: &'a GraphStore,
    decoder: &'a dyn EnvelopeDecoder,
    filter: &'a F,
    results: Vec<RecordId>,
}

impl<'a, F: SearchFilter + ?Sized> SearchFilterVisitor<'a, F> {
    pub fn new(store: &'a GraphStore, decoder: &'a dyn EnvelopeDecoder, filter: &'a F) -> Self {
        SearchFilterVisitor {
            store,
            decoder,
            filter,
            results: Vec::new(),
        }
    }

    pub fn into_results(self) -> Vec<RecordId> {
        self.results
    }
}

impl<F: SearchFilter + ?Sized> SpatialIndexVisitor for SearchFilterVisitor<'_, F> {
    fn needs_to_visit(&mut self, envelope: &Envelope) -> bool {
        self.filter.needs_to_visit(envelope)
    }

    fn on_index_reference(&mut self, record: RecordId) -> SpatialResult<()> {
        let envelope = self.decoder.decode(self.store, record)?;
        if self.filter.matches(&envelope) {
            self.results.push(record);
        }
        Ok(())
    }
}

/// Collects every reported payload without decoding it.
#[derive(Debug, Default)]
pub struct CollectingVisitor {
    records: Vec<RecordId>,
}

impl CollectingVisitor {
    pub fn new() -> Self {
        CollectingVisitor::default()
    }

    pub fn records(&self) -> &[RecordId] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RecordId> {
        self.records
    }
}

impl SpatialIndexVisitor for CollectingVisitor {
    fn needs_to_visit(&mut self, _envelope: &Envelope) -> bool {
        true
    }

    fn on_index_reference(&mut self, record: RecordId) -> SpatialResult<()> {
        self.records.push(record);
        Ok(())
    }
}
