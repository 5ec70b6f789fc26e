//! Quadratic split of an overflowing node's entries.

use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use strata::store::RecordId;

/// One entry of a node being split: a child node or a payload, with its box.
pub(crate) type SplitEntry = (RecordId, Envelope);

/// One half of a split, with the running union of its entries.
#[derive(Debug)]
pub(crate) struct SplitGroup {
    pub(crate) entries: Vec<SplitEntry>,
    pub(crate) envelope: Envelope,
}

impl SplitGroup {
    fn seeded(entry: SplitEntry) -> Self {
        SplitGroup {
            envelope: entry.1,
            entries: vec![entry],
        }
    }

    fn push(&mut self, entry: SplitEntry) {
        self.envelope.expand_to_include(&entry.1);
        self.entries.push(entry);
    }

    fn extend(&mut self, entries: impl IntoIterator<Item = SplitEntry>) {
        for entry in entries {
            self.push(entry);
        }
    }
}

/// Partitions `entries` into two groups by quadratic cost.
///
/// Seeds are the pair wasting the most area when boxed together. The rest
/// go one at a time, most decisive first, to the group they enlarge least.
/// As soon as a group can only reach `min_entries` by taking everything
/// left, it takes everything left.
pub(crate) fn quadratic_split(
    mut entries: Vec<SplitEntry>,
    min_entries: usize,
) -> SpatialResult<(SplitGroup, SplitGroup)> {
    if entries.len() < 2 {
        return Err(SpatialError::InvariantViolation(format!(
            "cannot split a node with {} entries",
            entries.len()
        )));
    }

    let (first, second) = pick_seeds(&entries);
    // remove the higher index first so the lower one stays valid
    let seed2 = entries.swap_remove(second);
    let seed1 = entries.swap_remove(first);
    let mut group1 = SplitGroup::seeded(seed1);
    let mut group2 = SplitGroup::seeded(seed2);

    while !entries.is_empty() {
        if group1.entries.len() + entries.len() <= min_entries {
            group1.extend(entries.drain(..));
            break;
        }
        if group2.entries.len() + entries.len() <= min_entries {
            group2.extend(entries.drain(..));
            break;
        }

        let next = pick_next(&group1, &group2, &entries);
        let entry = entries.remove(next);
        if prefers_first(&group1, &group2, &entry.1) {
            group1.push(entry);
        } else {
            group2.push(entry);
        }
    }

    Ok((group1, group2))
}

/// Returns `(i, j)` with `i < j`, maximizing wasted area.
fn pick_seeds(entries: &[SplitEntry]) -> (usize, usize) {
    let mut max_waste = f64::NEG_INFINITY;
    let mut best_pair = (0, 1);

    for (i, (_, a)) in entries.iter().enumerate() {
        for (j, (_, b)) in entries.iter().enumerate().skip(i + 1) {
            let waste = Envelope::union(a, b).area() - a.area() - b.area();
            if waste > max_waste {
                max_waste = waste;
                best_pair = (i, j);
            }
        }
    }

    best_pair
}

fn pick_next(group1: &SplitGroup, group2: &SplitGroup, remaining: &[SplitEntry]) -> usize {
    let mut max_difference = f64::NEG_INFINITY;
    let mut best_idx = 0;

    for (i, (_, envelope)) in remaining.iter().enumerate() {
        let increase1 = group1.envelope.enlargement(envelope);
        let increase2 = group2.envelope.enlargement(envelope);

        let difference = (increase1 - increase2).abs();
        if difference > max_difference {
            max_difference = difference;
            best_idx = i;
        }
    }

    best_idx
}

// ties: smaller area, then fewer entries, then the first group
fn prefers_first(group1: &SplitGroup, group2: &SplitGroup, envelope: &Envelope) -> bool {
    let increase1 = group1.envelope.enlargement(envelope);
    let increase2 = group2.envelope.enlargement(envelope);
    if increase1 != increase2 {
        return increase1 < increase2;
    }

    let area1 = group1.envelope.area();
    let area2 = group2.envelope.area();
    if area1 != area2 {
        return area1 < area2;
    }

    group1.entries.len() <= group2.entries.len()
}
