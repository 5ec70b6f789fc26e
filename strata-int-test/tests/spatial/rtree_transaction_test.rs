//! The tree inside caller-owned transactions.

use std::thread;
use std::time::Duration;
use strata::errors::ErrorKind;
use strata_int_test::test_util::{cleanup, create_test_context, run_test};
use strata_spatial::decoder::BBoxPropertyDecoder;
use strata_spatial::rtree::{RTreeConfig, RTreeIndex};
use strata_spatial::search::SearchAll;
use strata_spatial::{SpatialError, SpatialResult};

#[test]
fn test_rollback_leaves_tree_untouched() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = ctx.random_rects(20, 31)?;
            for record in &records[..10] {
                index.add(*record)?;
            }
            let count = index.count()?;
            let bbox = index.bounding_box()?;
            let depth = index.depth()?;

            let store = ctx.store();
            let tx = store.begin_transaction()?;
            for record in &records[10..] {
                index.add(*record)?;
            }
            index.remove(records[0], false)?;
            assert_eq!(index.search_index(&SearchAll)?.len(), 19);
            tx.rollback()?;

            assert_eq!(index.count()?, count);
            assert_eq!(index.bounding_box()?, bbox);
            assert_eq!(index.depth()?, depth);
            assert!(index.is_indexed(records[0])?);
            for record in &records[10..] {
                assert!(!index.is_indexed(*record)?);
            }
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_dropped_transaction_rolls_back_lazy_root() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let record = ctx.rect(0.0, 0.0, 1.0, 1.0)?;
            {
                let _tx = ctx.store().begin_transaction()?;
                index.add(record)?;
                assert!(index.index_root()?.is_some());
            }
            assert_eq!(index.index_root()?, None);
            assert!(!index.is_indexed(record)?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_failed_add_poisons_enclosing_transaction() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let good = ctx.rect(0.0, 0.0, 1.0, 1.0)?;
            let store = ctx.store();

            let tx = store.begin_transaction()?;
            index.add(good)?;
            assert!(matches!(index.add(good), Err(SpatialError::AlreadyIndexed(_))));
            let err = tx.commit().expect_err("rollback-only transaction must not commit");
            assert_eq!(err.kind(), &ErrorKind::TransactionError);

            assert!(!index.is_indexed(good)?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_try_remove_keeps_enclosing_transaction_usable() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let indexed = ctx.rect(0.0, 0.0, 1.0, 1.0)?;
            let loose = ctx.rect(5.0, 5.0, 6.0, 6.0)?;
            let store = ctx.store();

            let tx = store.begin_transaction()?;
            index.add(indexed)?;
            assert!(!index.try_remove(loose, false)?);
            tx.commit()?;

            assert!(index.is_indexed(indexed)?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_closed_store_rejects_operations() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let record = ctx.rect(0.0, 0.0, 1.0, 1.0)?;
            ctx.store().close()?;

            let result: SpatialResult<()> = index.add(record);
            assert!(matches!(
                result,
                Err(SpatialError::Store(e)) if e.kind() == &ErrorKind::StoreAlreadyClosed
            ));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_rollback_keeps_other_thread_tree_writes() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let other_layer = store.with_transaction(|| store.create_record())?;
            let other = RTreeIndex::new(
                store.clone(),
                other_layer,
                BBoxPropertyDecoder::default(),
                RTreeConfig::builder()
                    .max_node_references(4)
                    .min_node_references(2)
                    .build()?,
            )?;
            let index = ctx.index(4, 2)?;
            let mine = ctx.rect(0.0, 0.0, 1.0, 1.0)?;
            let theirs = ctx.rect(5.0, 5.0, 6.0, 6.0)?;

            let tx = store.begin_transaction()?;
            index.add(mine)?;

            let writer = {
                let other = other.clone();
                thread::spawn(move || -> SpatialResult<bool> {
                    other.add(theirs)?;
                    other.is_indexed(theirs)
                })
            };
            thread::sleep(Duration::from_millis(50));
            assert!(!writer.is_finished());

            tx.rollback()?;
            assert!(writer.join().expect("writer thread")?);

            assert!(!index.is_indexed(mine)?);
            assert!(other.is_indexed(theirs)?);
            assert_eq!(other.count()?, 1);
            other.validate()?;
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
