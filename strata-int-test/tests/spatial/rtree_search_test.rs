//! Search and visitor protocol.

use std::collections::BTreeSet;
use strata::store::RecordId;
use strata_int_test::test_util::{cleanup, create_test_context, run_test, TestContext};
use strata_spatial::rtree::RTreeIndex;
use strata_spatial::search::{
    CollectingVisitor, SearchAll, SearchContains, SearchCoveredBy, SearchEqualEnvelopes,
    SearchIntersect,
};
use strata_spatial::{Envelope, SpatialIndexVisitor, SpatialResult};

// (min_x, min_y, max_x, max_y)
const FIXTURE: [(f64, f64, f64, f64); 5] = [
    (0.0, 0.0, 2.0, 3.0),
    (10.0, 0.0, 10.0, 0.0),
    (12.0, 0.0, 12.0, 0.0),
    (14.0, 2.0, 14.0, 2.0),
    (25.0, 32.0, 25.0, 32.0),
];

fn load_fixture(ctx: &TestContext, index: &RTreeIndex) -> SpatialResult<Vec<RecordId>> {
    let mut records = Vec::new();
    for (min_x, min_y, max_x, max_y) in FIXTURE {
        let record = ctx.rect(min_x, min_y, max_x, max_y)?;
        index.add(record)?;
        records.push(record);
    }
    Ok(records)
}

fn sorted(records: Vec<RecordId>) -> Vec<RecordId> {
    let mut records = records;
    records.sort();
    records
}

struct NeverVisit {
    references: usize,
}

impl SpatialIndexVisitor for NeverVisit {
    fn needs_to_visit(&mut self, _envelope: &Envelope) -> bool {
        false
    }

    fn on_index_reference(&mut self, _record: RecordId) -> SpatialResult<()> {
        self.references += 1;
        Ok(())
    }
}

#[test]
fn test_covered_by_returns_points_in_window() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = load_fixture(&ctx, &index)?;

            let query = Envelope::new(9.0, 15.0, -1.0, 3.0);
            let hits = sorted(index.search_index(&SearchCoveredBy::new(query))?);
            assert_eq!(hits, sorted(records[1..4].to_vec()));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_covered_by_after_splits() {
    run_test(
        || create_test_context(),
        |ctx| {
            // a small fanout forces the fixture over several leaves
            let index = ctx.index(2, 1)?;
            let records = load_fixture(&ctx, &index)?;
            assert!(index.depth()? > 1);

            let query = Envelope::new(9.0, 15.0, -1.0, 3.0);
            let hits = sorted(index.search_index(&SearchCoveredBy::new(query))?);
            assert_eq!(hits, sorted(records[1..4].to_vec()));
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_other_filters() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = load_fixture(&ctx, &index)?;

            let all = sorted(index.search_index(&SearchAll)?);
            assert_eq!(all, sorted(records.clone()));

            let intersecting =
                sorted(index.search_index(&SearchIntersect::new(Envelope::new(1.0, 10.0, 0.0, 1.0)))?);
            assert_eq!(intersecting, sorted(vec![records[0], records[1]]));

            let equal = index.search_index(&SearchEqualEnvelopes::new(Envelope::point(12.0, 0.0)))?;
            assert_eq!(equal, vec![records[2]]);

            let containing = index.search_index(&SearchContains::new(Envelope::point(1.0, 1.0)))?;
            assert_eq!(containing, vec![records[0]]);

            let nothing =
                index.search_index(&SearchCoveredBy::new(Envelope::new(100.0, 200.0, 100.0, 200.0)))?;
            assert!(nothing.is_empty());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_never_visit_sees_nothing() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            for record in ctx.random_rects(50, 9)? {
                index.add(record)?;
            }

            let visited_before = index.stats().nodes_visited;
            let mut visitor = NeverVisit { references: 0 };
            index.search(&mut visitor)?;
            assert_eq!(visitor.references, 0);
            assert_eq!(index.stats().nodes_visited, visited_before);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_visit_and_iterator_agree() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = ctx.random_rects(60, 10)?;
            for record in &records {
                index.add(*record)?;
            }

            let mut visitor = CollectingVisitor::new();
            index.visit(&mut visitor)?;
            let visited: BTreeSet<RecordId> = visitor.into_records().into_iter().collect();
            let iterated = index
                .all_indexed_records()
                .collect::<SpatialResult<BTreeSet<_>>>()?;

            assert_eq!(visited, records.into_iter().collect());
            assert_eq!(visited, iterated);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
