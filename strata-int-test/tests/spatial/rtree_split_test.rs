//! Node splits and underflow collapses.

use strata::store::{Direction, RecordId};
use strata_int_test::test_util::{cleanup, create_test_context, run_test};
use strata_spatial::rtree::constants::{RTREE_CHILD, RTREE_REFERENCE};
use strata_spatial::rtree::IndexNodeRepository;
use strata_spatial::Envelope;

#[test]
fn test_split_of_overflowing_root_leaf() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let boxes = [
                (0.0, 0.0, 1.0, 1.0),
                (2.0, 0.0, 3.0, 1.0),
                (50.0, 50.0, 51.0, 51.0),
                (52.0, 50.0, 53.0, 51.0),
                (1.0, 2.0, 2.0, 3.0),
            ];
            let mut expected: Option<Envelope> = None;
            for (min_x, min_y, max_x, max_y) in boxes {
                let record = ctx.rect(min_x, min_y, max_x, max_y)?;
                index.add(record)?;
                let envelope = Envelope::new(min_x, max_x, min_y, max_y);
                expected = Some(match expected {
                    Some(current) => Envelope::union(&current, &envelope),
                    None => envelope,
                });
            }

            let store = ctx.store();
            let root = index.index_root()?.expect("root exists after inserts");
            let children = store.edges_of(root, &RTREE_CHILD, Direction::Outgoing)?;
            assert_eq!(children.len(), 2);
            for child in children {
                let entries = store
                    .edges_of(child.end(), &RTREE_REFERENCE, Direction::Outgoing)?
                    .len();
                assert!((2..=4).contains(&entries), "leaf holds {} entries", entries);
            }

            assert_eq!(index.bounding_box()?, expected);
            assert_eq!(index.depth()?, 2);
            assert_eq!(index.stats().splits, 1);
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_deep_tree_splits_propagate() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            for record in ctx.random_rects(200, 11)? {
                index.add(record)?;
            }
            assert!(index.depth()? >= 4);
            assert!(index.stats().splits > 50);

            let nodes = IndexNodeRepository::new(ctx.store());
            let root = index.index_root()?.expect("root exists after inserts");
            assert!(!nodes.is_leaf(root)?);
            assert!(nodes.child_count(root)? <= 4);
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_deletion_underflow_with_wide_minimum() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(100, 51)?;
            let mut live: Vec<(RecordId, Envelope)> = Vec::new();
            for i in 0..101 {
                let x = (i % 10) as f64 * 3.0;
                let y = (i / 10) as f64 * 3.0;
                let record = ctx.rect(x, y, x + 1.0 + (i % 3) as f64, y + 1.0)?;
                live.push((record, Envelope::new(x, x + 1.0 + (i % 3) as f64, y, y + 1.0)));
                index.add(record)?;
            }
            assert_eq!(index.count()?, 101);
            assert_eq!(index.depth()?, 2);

            while let Some((record, _)) = live.pop() {
                let before = index.count()?;
                index.remove(record, false)?;
                assert_eq!(index.count()?, before - 1);

                let remaining = Envelope::union_all(live.iter().map(|(_, envelope)| envelope));
                assert_eq!(index.bounding_box()?, remaining);
                index.validate()?;
            }

            assert!(index.is_empty()?);
            assert!(index.stats().collapses >= 1);
            assert!(index.stats().reinserted_records >= 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_collapse_reinserts_orphans() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = ctx.random_rects(40, 5)?;
            for record in &records {
                index.add(*record)?;
            }

            // at least ten leaves cannot all keep two entries out of ten records
            for record in &records[..30] {
                index.remove(*record, false)?;
            }
            let stats = index.stats();
            assert!(stats.collapses > 0);
            assert!(stats.reinserted_records >= stats.collapses);

            for record in &records[30..] {
                assert!(index.is_indexed(*record)?);
            }
            assert_eq!(index.count()?, 10);
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
