use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the structural events of one [`RTreeIndex`](super::RTreeIndex).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RTreeStats {
    /// Node splits, root splits included
    pub splits: u64,
    /// Underflowing subtrees collapsed by removals
    pub collapses: u64,
    /// Payloads re-inserted after a collapse
    pub reinserted_records: u64,
    /// Full traversals made to recompute a stale count
    pub count_recomputations: u64,
    /// Index nodes entered by searches and traversals
    pub nodes_visited: u64,
}

/// Internal statistics tracking
#[derive(Debug, Default)]
pub(crate) struct RTreeStatistics {
    pub(crate) splits: AtomicU64,
    pub(crate) collapses: AtomicU64,
    pub(crate) reinserted_records: AtomicU64,
    pub(crate) count_recomputations: AtomicU64,
    pub(crate) nodes_visited: AtomicU64,
}

impl RTreeStatistics {
    pub(crate) fn snapshot(&self) -> RTreeStats {
        RTreeStats {
            splits: self.splits.load(Ordering::Relaxed),
            collapses: self.collapses.load(Ordering::Relaxed),
            reinserted_records: self.reinserted_records.load(Ordering::Relaxed),
            count_recomputations: self.count_recomputations.load(Ordering::Relaxed),
            nodes_visited: self.nodes_visited.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn increment(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}
