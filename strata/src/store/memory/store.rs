use super::arena::{Arena, UndoOp};
use super::config::InMemoryStoreConfig;
use crate::common::{shared, LockScope, Shared, Value};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::store::{Direction, Edge, EdgeId, EdgeType, GraphStoreProvider, RecordId};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// In-memory implementation of [`GraphStoreProvider`].
///
/// # Purpose
/// `InMemoryGraphStore` keeps records and edges in an arena guarded by a
/// single lock. It is the store used by tests and by callers that do not
/// need persistence.
///
/// # Transactions
/// Every write inside a transaction appends its inverse to an undo journal.
/// Scopes nest by depth: the outermost close either drops the journal
/// (commit) or replays it backwards (rollback). A rollback at any depth marks
/// the transaction rollback-only, and committing the outermost scope of such
/// a transaction rolls it back and reports `ErrorKind::TransactionError`.
///
/// The open transaction belongs to the thread that began it. Other threads
/// block in `begin_transaction` and in reads until the outermost scope
/// closes, so they never observe uncommitted state. With strict
/// transactions a write from a thread that does not own the open
/// transaction fails with `ErrorKind::NotInTransaction`; without them it
/// waits for the transaction to finish and is applied unjournaled.
///
/// # Usage
/// ```rust
/// use strata::store::memory::InMemoryGraphStore;
/// use strata::store::GraphStore;
///
/// let store = GraphStore::new(InMemoryGraphStore::default());
/// let tx = store.begin_transaction().unwrap();
/// let id = store.create_record().unwrap();
/// tx.rollback().unwrap();
/// assert!(!store.record_exists(id).unwrap());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryGraphStore {
    inner: Arc<InMemoryGraphStoreInner>,
}

impl InMemoryGraphStore {
    pub fn new(config: InMemoryStoreConfig) -> InMemoryGraphStore {
        InMemoryGraphStore {
            inner: Arc::new(InMemoryGraphStoreInner::new(config)),
        }
    }

    pub fn config(&self) -> &InMemoryStoreConfig {
        &self.inner.config
    }
}

impl GraphStoreProvider for InMemoryGraphStore {
    fn create_record(&self) -> StrataResult<RecordId> {
        self.inner.write(|arena| {
            let (id, undo) = arena.create_record();
            Ok((id, undo))
        })
    }

    fn delete_record(&self, id: RecordId) -> StrataResult<()> {
        self.inner.write(|arena| Ok(((), arena.delete_record(id)?)))
    }

    fn record_exists(&self, id: RecordId) -> StrataResult<bool> {
        self.inner.read(|arena| Ok(arena.record_exists(id)))
    }

    fn record_count(&self) -> StrataResult<usize> {
        self.inner.read(|arena| Ok(arena.record_count()))
    }

    fn create_edge(&self, from: RecordId, to: RecordId, edge_type: &EdgeType) -> StrataResult<EdgeId> {
        self.inner.write(|arena| arena.create_edge(from, to, edge_type))
    }

    fn delete_edge(&self, edge: EdgeId) -> StrataResult<()> {
        self.inner.write(|arena| Ok(((), arena.delete_edge(edge)?)))
    }

    fn edge(&self, edge: EdgeId) -> StrataResult<Edge> {
        self.inner.read(|arena| arena.edge(edge))
    }

    fn edges_of(
        &self,
        id: RecordId,
        edge_type: &EdgeType,
        direction: Direction,
    ) -> StrataResult<Vec<Edge>> {
        self.inner.read(|arena| arena.edges_of(id, edge_type, direction))
    }

    fn get_property(&self, id: RecordId, key: &str) -> StrataResult<Option<Value>> {
        self.inner.read(|arena| arena.get_property(id, key))
    }

    fn set_property(&self, id: RecordId, key: &str, value: Value) -> StrataResult<()> {
        self.inner
            .write(|arena| Ok(((), arena.set_property(id, key, value)?)))
    }

    fn remove_property(&self, id: RecordId, key: &str) -> StrataResult<Option<Value>> {
        self.inner.write(|arena| arena.remove_property(id, key))
    }

    fn open_transaction(&self) -> StrataResult<()> {
        self.inner.open_transaction()
    }

    fn close_transaction(&self, commit: bool) -> StrataResult<()> {
        self.inner.close_transaction(commit)
    }

    fn in_transaction(&self) -> bool {
        self.inner.owns_transaction()
    }

    fn close(&self) -> StrataResult<()> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct TransactionState {
    depth: usize,
    rollback_only: bool,
    journal: Vec<UndoOp>,
}

#[derive(Debug, Default)]
struct StoreState {
    arena: Arena,
    tx: TransactionState,
}

impl StoreState {
    fn roll_back(&mut self) -> StrataResult<()> {
        let journal = std::mem::take(&mut self.tx.journal);
        self.tx.rollback_only = false;
        for op in journal.into_iter().rev() {
            self.arena.undo(op).map_err(|err| {
                StrataError::new_with_cause(
                    "Failed to roll back transaction",
                    ErrorKind::TransactionError,
                    err,
                )
            })?;
        }
        Ok(())
    }
}

/// Ownership of the open transaction.
///
/// At most one thread owns the transaction at a time; the others wait on
/// `released` before touching the arena.
#[derive(Default)]
struct TransactionGate {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

#[derive(Default)]
struct InMemoryGraphStoreInner {
    config: InMemoryStoreConfig,
    closed: AtomicBool,
    gate: TransactionGate,
    state: Shared<StoreState>,
}

impl InMemoryGraphStoreInner {
    fn new(config: InMemoryStoreConfig) -> InMemoryGraphStoreInner {
        let arena = Arena::with_capacity(config.initial_capacity());
        InMemoryGraphStoreInner {
            config,
            closed: AtomicBool::new(false),
            gate: TransactionGate::default(),
            state: shared(StoreState {
                arena,
                tx: TransactionState::default(),
            }),
        }
    }

    fn check_opened(&self) -> StrataResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("In-memory store is already closed");
            return Err(StrataError::new(
                "Store is already closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    /// Blocks while another thread owns the open transaction.
    ///
    /// The returned guard keeps other threads from opening a transaction
    /// until the caller is done with the arena.
    fn wait_for_gate(&self) -> StrataResult<MutexGuard<'_, Option<ThreadId>>> {
        let me = thread::current().id();
        let mut owner = self.gate.owner.lock();
        while matches!(*owner, Some(other) if other != me) {
            self.gate.released.wait(&mut owner);
        }
        self.check_opened()?;
        Ok(owner)
    }

    fn read<R>(&self, operation: impl FnOnce(&Arena) -> StrataResult<R>) -> StrataResult<R> {
        self.check_opened()?;
        let _owner = self.wait_for_gate()?;
        self.state.with_read(|state| operation(&state.arena))
    }

    /// Applies a write and journals its inverse when this thread owns the
    /// open transaction.
    fn write<R>(
        &self,
        operation: impl FnOnce(&mut Arena) -> StrataResult<(R, UndoOp)>,
    ) -> StrataResult<R> {
        self.check_opened()?;
        let me = thread::current().id();
        let mut owner = self.gate.owner.lock();
        if *owner != Some(me) {
            if self.config.strict_transactions() {
                return Err(StrataError::new(
                    "Write attempted outside of a transaction",
                    ErrorKind::NotInTransaction,
                ));
            }
            while owner.is_some() {
                self.gate.released.wait(&mut owner);
            }
            self.check_opened()?;
        }

        let journaled = owner.is_some();
        self.state.with_write(|state| {
            let (result, undo) = operation(&mut state.arena)?;
            if journaled {
                state.tx.journal.push(undo);
            }
            Ok(result)
        })
    }

    fn open_transaction(&self) -> StrataResult<()> {
        self.check_opened()?;
        let mut owner = self.wait_for_gate()?;
        *owner = Some(thread::current().id());
        self.state.with_write(|state| state.tx.depth += 1);
        Ok(())
    }

    fn close_transaction(&self, commit: bool) -> StrataResult<()> {
        self.check_opened()?;
        let mut owner = self.gate.owner.lock();
        if *owner != Some(thread::current().id()) {
            return Err(StrataError::new(
                "No transaction is open on this thread",
                ErrorKind::TransactionError,
            ));
        }

        let (result, finished) = self.state.with_write(|state| {
            state.tx.depth = state.tx.depth.saturating_sub(1);
            if !commit {
                state.tx.rollback_only = true;
            }

            if state.tx.depth > 0 {
                return (Ok(()), false);
            }

            let result = if state.tx.rollback_only {
                state.roll_back().and_then(|_| {
                    if commit {
                        Err(StrataError::new(
                            "Transaction was marked rollback-only and has been rolled back",
                            ErrorKind::TransactionError,
                        ))
                    } else {
                        Ok(())
                    }
                })
            } else {
                state.tx.journal.clear();
                Ok(())
            };
            (result, true)
        });

        if finished {
            *owner = None;
            self.gate.released.notify_all();
        }
        result
    }

    fn owns_transaction(&self) -> bool {
        *self.gate.owner.lock() == Some(thread::current().id())
    }

    fn close(&self) -> StrataResult<()> {
        self.check_opened()?;
        let mut owner = self.gate.owner.lock();
        let result = self.state.with_write(|state| {
            if state.tx.depth > 0 {
                log::warn!(
                    "Closing in-memory store with {} open transaction scope(s), rolling back",
                    state.tx.depth
                );
                state.tx.depth = 0;
                state.roll_back()?;
            }
            Ok::<(), StrataError>(())
        });
        self.closed.store(true, Ordering::Relaxed);
        *owner = None;
        self.gate.released.notify_all();
        result
    }
}
