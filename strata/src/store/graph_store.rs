use crate::common::Value;
use crate::errors::{StrataError, StrataResult};
use crate::store::{Direction, Edge, EdgeId, EdgeType, RecordId, Transaction};
use std::ops::Deref;
use std::sync::Arc;

/// Low-level contract every record/edge store implements.
///
/// # Purpose
/// A store manages records, the typed directed edges between them, the
/// property bag of every record, and the transaction scope that all writes
/// happen in.
///
/// # Transactions
/// `open_transaction` / `close_transaction` are the raw hooks behind
/// [`GraphStore::begin_transaction`]. Callers never use them directly; the
/// [`Transaction`] guard pairs them up on every exit path.
///
/// # Thread Safety
/// Implementers must be `Send + Sync`.
pub trait GraphStoreProvider: Send + Sync {
    /// Creates a new, empty record.
    fn create_record(&self) -> StrataResult<RecordId>;

    /// Deletes a record. Fails with `RecordInUse` while edges are attached.
    fn delete_record(&self, id: RecordId) -> StrataResult<()>;

    /// Checks whether a record exists.
    fn record_exists(&self, id: RecordId) -> StrataResult<bool>;

    /// Number of live records.
    fn record_count(&self) -> StrataResult<usize>;

    /// Creates a directed edge of the given type.
    fn create_edge(&self, from: RecordId, to: RecordId, edge_type: &EdgeType) -> StrataResult<EdgeId>;

    /// Deletes an edge.
    fn delete_edge(&self, edge: EdgeId) -> StrataResult<()>;

    /// Looks up an edge by id.
    fn edge(&self, edge: EdgeId) -> StrataResult<Edge>;

    /// Lists the edges of a record with the given type and direction.
    ///
    /// The order of the returned edges is unspecified.
    fn edges_of(
        &self,
        id: RecordId,
        edge_type: &EdgeType,
        direction: Direction,
    ) -> StrataResult<Vec<Edge>>;

    /// Reads a property; `None` when the record has no such property.
    fn get_property(&self, id: RecordId, key: &str) -> StrataResult<Option<Value>>;

    /// Sets a property, replacing any previous value.
    fn set_property(&self, id: RecordId, key: &str, value: Value) -> StrataResult<()>;

    /// Removes a property and returns its previous value.
    fn remove_property(&self, id: RecordId, key: &str) -> StrataResult<Option<Value>>;

    /// Enters a (possibly nested) transaction scope owned by the calling
    /// thread, waiting while another thread owns one.
    fn open_transaction(&self) -> StrataResult<()>;

    /// Leaves the innermost transaction scope, committing or rolling back.
    fn close_transaction(&self, commit: bool) -> StrataResult<()>;

    /// Checks whether the calling thread has a transaction scope open.
    fn in_transaction(&self) -> bool;

    /// Closes the store. Further operations fail with `StoreAlreadyClosed`.
    fn close(&self) -> StrataResult<()>;

    /// Checks whether the store is closed.
    fn is_closed(&self) -> bool;
}

/// Cheap to clone handle to a store provider.
///
/// All clones share the same underlying provider through an `Arc`.
///
/// # Examples
///
/// ```rust
/// use strata::store::memory::InMemoryGraphStore;
/// use strata::store::{Direction, EdgeType, GraphStore};
///
/// # fn main() -> strata::errors::StrataResult<()> {
/// let store = GraphStore::new(InMemoryGraphStore::default());
/// let knows = EdgeType::new("KNOWS");
///
/// let tx = store.begin_transaction()?;
/// let a = store.create_record()?;
/// let b = store.create_record()?;
/// store.create_edge(a, b, &knows)?;
/// tx.commit()?;
///
/// assert_eq!(store.edges_of(a, &knows, Direction::Outgoing)?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GraphStore {
    inner: Arc<dyn GraphStoreProvider>,
}

impl GraphStore {
    pub fn new<T: GraphStoreProvider + 'static>(provider: T) -> Self {
        GraphStore {
            inner: Arc::new(provider),
        }
    }

    /// Opens a transaction scope.
    ///
    /// The returned guard rolls back when dropped without a commit.
    pub fn begin_transaction(&self) -> StrataResult<Transaction> {
        self.inner.open_transaction()?;
        Ok(Transaction::new(self.inner.clone()))
    }

    /// Runs `operation` inside a transaction scope.
    ///
    /// Commits when the operation returns `Ok`, rolls back otherwise. The
    /// error type only needs to absorb store errors, so extension crates can
    /// use their own.
    pub fn with_transaction<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StrataError>,
    {
        let tx = self.begin_transaction()?;
        let result = operation()?;
        tx.commit()?;
        Ok(result)
    }

    /// Returns the single edge of the given type and direction, if any.
    ///
    /// Fails with `InvalidOperation` when more than one edge matches.
    pub fn single_edge(
        &self,
        id: RecordId,
        edge_type: &EdgeType,
        direction: Direction,
    ) -> StrataResult<Option<Edge>> {
        let mut edges = self.inner.edges_of(id, edge_type, direction)?;
        match edges.len() {
            0 => Ok(None),
            1 => Ok(edges.pop()),
            n => Err(StrataError::new(
                &format!(
                    "Record {} has {} {:?} edges of type {}, expected at most one",
                    id, n, direction, edge_type
                ),
                crate::errors::ErrorKind::InvalidOperation,
            )),
        }
    }

    /// Checks whether the record has at least one edge of the given type and direction.
    pub fn has_edge(
        &self,
        id: RecordId,
        edge_type: &EdgeType,
        direction: Direction,
    ) -> StrataResult<bool> {
        Ok(!self.inner.edges_of(id, edge_type, direction)?.is_empty())
    }
}

impl Deref for GraphStore {
    type Target = Arc<dyn GraphStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("closed", &self.inner.is_closed())
            .field("in_transaction", &self.inner.in_transaction())
            .finish()
    }
}
