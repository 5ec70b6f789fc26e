//! Transaction behavior of the in-memory store.

use std::thread;
use std::time::Duration;
use strata::common::Value;
use strata::errors::{ErrorKind, StrataResult};
use strata::store::memory::{InMemoryGraphStore, InMemoryStoreConfig};
use strata::store::{Direction, EdgeType, GraphStore, RecordId, TransactionState};
use strata_int_test::test_util::{cleanup, create_test_context, run_test};

const LINK: EdgeType = EdgeType::from_static("LINK");

#[test]
fn test_commit_insert() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let tx = store.begin_transaction()?;
            let a = store.create_record()?;
            let b = store.create_record()?;
            store.create_edge(a, b, &LINK)?;
            store.set_property(a, "name", Value::from("a"))?;
            assert_eq!(tx.state(), TransactionState::Active);
            tx.commit()?;

            assert_eq!(store.edges_of(a, &LINK, Direction::Outgoing)?.len(), 1);
            assert_eq!(store.get_property(a, "name")?, Some(Value::from("a")));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_rollback_insert_update_remove() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let (a, b) = store.with_transaction(|| -> strata::errors::StrataResult<_> {
                let a = store.create_record()?;
                let b = store.create_record()?;
                store.set_property(a, "name", Value::from("before"))?;
                store.create_edge(a, b, &LINK)?;
                Ok((a, b))
            })?;
            let records_before = store.record_count()?;

            let tx = store.begin_transaction()?;
            store.create_record()?;
            store.set_property(a, "name", Value::from("after"))?;
            for edge in store.edges_of(a, &LINK, Direction::Outgoing)? {
                store.delete_edge(edge.id())?;
            }
            store.delete_record(b)?;
            tx.rollback()?;

            assert_eq!(store.record_count()?, records_before);
            assert_eq!(store.get_property(a, "name")?, Some(Value::from("before")));
            assert!(store.record_exists(b)?);
            assert!(store.has_edge(b, &LINK, Direction::Incoming)?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_inner_rollback_dooms_outer_commit() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let records_before = store.record_count()?;

            let outer = store.begin_transaction()?;
            store.create_record()?;
            let inner = store.begin_transaction()?;
            store.create_record()?;
            inner.rollback()?;

            let err = outer.commit().expect_err("outer commit must fail");
            assert_eq!(err.kind(), &ErrorKind::TransactionError);
            assert_eq!(store.record_count()?, records_before);
            assert!(!store.in_transaction());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_strict_store_rejects_writes_outside_transaction() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let err = store.create_record().expect_err("write outside a transaction");
            assert_eq!(err.kind(), &ErrorKind::NotInTransaction);

            let relaxed = GraphStore::new(InMemoryGraphStore::new(
                InMemoryStoreConfig::new().with_strict_transactions(false),
            ));
            let id = relaxed.create_record()?;
            assert!(relaxed.record_exists(id)?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_record_in_use_cannot_be_deleted() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let tx = store.begin_transaction()?;
            let a = store.create_record()?;
            let b = store.create_record()?;
            store.create_edge(a, b, &LINK)?;
            let err = store.delete_record(b).expect_err("record with edges");
            assert_eq!(err.kind(), &ErrorKind::RecordInUse);
            tx.commit()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_close_rolls_back_open_transaction() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let tx = store.begin_transaction()?;
            store.create_record()?;
            store.close()?;
            assert!(store.is_closed());

            let err = store.record_count().expect_err("closed store");
            assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
            drop(tx);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_rollback_does_not_undo_other_thread_commit() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let records_before = store.record_count()?;

            let tx = store.begin_transaction()?;
            let mine = store.create_record()?;

            let writer = {
                let store = store.clone();
                thread::spawn(move || -> StrataResult<RecordId> {
                    let tx = store.begin_transaction()?;
                    let id = store.create_record()?;
                    tx.commit()?;
                    Ok(id)
                })
            };
            thread::sleep(Duration::from_millis(50));
            assert!(!writer.is_finished(), "second transaction must wait for the first");

            tx.rollback()?;
            let theirs = writer.join().expect("writer thread")?;

            assert!(!store.record_exists(mine)?);
            assert!(store.record_exists(theirs)?);
            assert_eq!(store.record_count()?, records_before + 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_other_thread_sees_only_committed_state() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let tx = store.begin_transaction()?;
            let id = store.create_record()?;
            store.set_property(id, "name", Value::from("draft"))?;

            let reader = {
                let store = store.clone();
                thread::spawn(move || store.get_property(id, "name"))
            };
            thread::sleep(Duration::from_millis(50));
            assert!(!reader.is_finished(), "reader must wait for the open transaction");

            tx.commit()?;
            assert_eq!(
                reader.join().expect("reader thread")?,
                Some(Value::from("draft"))
            );

            let intruder = store.clone();
            let tx = store.begin_transaction()?;
            let err = thread::spawn(move || intruder.set_property(id, "name", Value::from("x")))
                .join()
                .expect("intruder thread")
                .expect_err("write from a thread without the transaction");
            assert_eq!(err.kind(), &ErrorKind::NotInTransaction);
            tx.commit()?;
            assert_eq!(store.get_property(id, "name")?, Some(Value::from("draft")));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
