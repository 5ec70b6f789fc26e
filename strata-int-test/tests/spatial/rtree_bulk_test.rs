//! Bulk insertion, chunked removal and clearing.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use strata::store::{Direction, EdgeType, RecordId};
use strata_int_test::test_util::{cleanup, create_test_context, random_envelope, run_test};
use strata_spatial::decoder::BBoxPropertyDecoder;
use strata_spatial::progress::{NullListener, ProgressListener, ProgressLoggingListener};
use strata_spatial::rtree::{RTreeConfig, RTreeIndex};
use strata_spatial::search::SearchIntersect;
use strata_spatial::{SpatialError, SpatialResult};

const TAGGED: EdgeType = EdgeType::from_static("TAGGED");

fn positions(records: &[RecordId]) -> HashMap<RecordId, usize> {
    records
        .iter()
        .enumerate()
        .map(|(position, record)| (*record, position))
        .collect()
}

#[test]
fn test_add_all_matches_incremental_insertion() {
    run_test(
        || create_test_context(),
        |ctx| {
            let config = RTreeConfig::builder()
                .max_node_references(8)
                .min_node_references(4)
                .batch_size(64)
                .build()?;
            let bulk = ctx.index_with(config)?;
            let bulk_records = ctx.random_rects(300, 21)?;

            let store = ctx.store();
            let other_layer = store.with_transaction(|| store.create_record())?;
            let incremental = RTreeIndex::new(
                store.clone(),
                other_layer,
                BBoxPropertyDecoder::default(),
                config,
            )?;
            let incremental_records = ctx.random_rects(300, 21)?;

            let listener = ProgressLoggingListener::new("bulk insert");
            bulk.add_all(bulk_records.clone(), &listener)?;
            assert_eq!(listener.total(), 300);
            assert_eq!(listener.completed(), 300);
            for record in &incremental_records {
                incremental.add(*record)?;
            }

            bulk.validate()?;
            incremental.validate()?;
            assert_eq!(bulk.count()?, 300);
            assert_eq!(bulk.count()?, incremental.count()?);
            assert_eq!(bulk.bounding_box()?, incremental.bounding_box()?);

            let bulk_positions = positions(&bulk_records);
            let incremental_positions = positions(&incremental_records);
            let mut rng = StdRng::seed_from_u64(22);
            for _ in 0..20 {
                let mut query = random_envelope(&mut rng);
                query.expand_to_include(&random_envelope(&mut rng));
                let filter = SearchIntersect::new(query);

                let from_bulk: BTreeSet<usize> = bulk
                    .search_index(&filter)?
                    .into_iter()
                    .map(|record| bulk_positions[&record])
                    .collect();
                let from_incremental: BTreeSet<usize> = incremental
                    .search_index(&filter)?
                    .into_iter()
                    .map(|record| incremental_positions[&record])
                    .collect();
                assert_eq!(from_bulk, from_incremental);
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_add_all_rejects_indexed_records() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = ctx.random_rects(5, 23)?;
            index.add(records[2])?;

            let result = index.add_all(records.clone(), &NullListener);
            assert!(matches!(result, Err(SpatialError::AlreadyIndexed(r)) if r == records[2]));
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_remove_all_deletes_tree_and_payloads() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = ctx.random_rects(80, 24)?;
            index.add_all(records.clone(), &NullListener)?;

            let listener = ProgressLoggingListener::new("remove all");
            index.remove_all(true, &listener)?;
            assert!(listener.total() > 0);
            assert_eq!(listener.completed(), listener.total());

            let store = ctx.store();
            assert!(index.is_empty()?);
            assert_eq!(index.count()?, 0);
            assert_eq!(index.index_root()?, None);
            // only the layer record is left
            assert_eq!(store.record_count()?, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_interrupted_remove_all_resumes() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = ctx.random_rects(60, 25)?;
            index.add_all(records.clone(), &NullListener)?;

            // a foreign edge keeps one payload from being deleted
            let store = ctx.store();
            let anchor = store.with_transaction(|| -> SpatialResult<RecordId> {
                let anchor = store.create_record()?;
                store.create_edge(anchor, records[17], &TAGGED)?;
                Ok(anchor)
            })?;

            assert!(index.remove_all(true, &NullListener).is_err());
            assert!(index.is_empty()?);
            assert_eq!(index.count()?, 0);
            index.validate()?;
            assert!(store.record_exists(records[17])?);

            store.with_transaction(|| -> SpatialResult<()> {
                for edge in store.edges_of(anchor, &TAGGED, Direction::Outgoing)? {
                    store.delete_edge(edge.id())?;
                }
                Ok(())
            })?;

            index.remove_all(true, &NullListener)?;
            for record in &records {
                assert!(!store.record_exists(*record)?);
            }
            // the layer and the anchor
            assert_eq!(store.record_count()?, 2);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_clear_keeps_payloads_and_resets_tree() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = ctx.random_rects(30, 26)?;
            for record in &records {
                index.add(*record)?;
            }

            index.clear(&NullListener)?;
            assert!(index.is_empty()?);
            assert_eq!(index.count()?, 0);
            assert_eq!(index.depth()?, 1);
            for record in &records {
                assert!(ctx.store().record_exists(*record)?);
                assert!(!index.is_indexed(*record)?);
            }

            index.add_all(records.clone(), &NullListener)?;
            assert_eq!(index.count()?, 30);
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[derive(Default)]
struct RecordingListener {
    begins: AtomicU64,
    total: AtomicU64,
    worked: AtomicU64,
    done: AtomicU64,
}

impl ProgressListener for RecordingListener {
    fn begin(&self, units: u64) {
        self.begins.fetch_add(1, Ordering::Relaxed);
        self.total.store(units, Ordering::Relaxed);
    }

    fn worked(&self, units: u64) {
        self.worked.fetch_add(units, Ordering::Relaxed);
    }

    fn done(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_remove_all_reports_every_pending_tree_once() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let first = ctx.random_rects(40, 27)?;
            index.add_all(first.clone(), &NullListener)?;

            let store = ctx.store();
            let anchor = store.with_transaction(|| -> SpatialResult<RecordId> {
                let anchor = store.create_record()?;
                store.create_edge(anchor, first[5], &TAGGED)?;
                Ok(anchor)
            })?;
            assert!(index.remove_all(true, &NullListener).is_err());

            // a second tree grows while the first one is still parked
            let second = ctx.random_rects(30, 28)?;
            index.add_all(second.clone(), &NullListener)?;
            store.with_transaction(|| -> SpatialResult<()> {
                for edge in store.edges_of(anchor, &TAGGED, Direction::Outgoing)? {
                    store.delete_edge(edge.id())?;
                }
                Ok(())
            })?;

            let listener = RecordingListener::default();
            index.remove_all(true, &listener)?;
            assert_eq!(listener.begins.load(Ordering::Relaxed), 1);
            assert_eq!(listener.done.load(Ordering::Relaxed), 1);
            let total = listener.total.load(Ordering::Relaxed);
            assert!(total >= 2, "both trees have leaves, got {}", total);
            assert_eq!(listener.worked.load(Ordering::Relaxed), total);

            for record in first.iter().chain(second.iter()) {
                assert!(!store.record_exists(*record)?);
            }
            assert_eq!(store.record_count()?, 2);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
