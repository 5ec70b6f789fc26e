use crate::errors::StrataResult;
use crate::store::GraphStoreProvider;
use std::marker::PhantomData;
use std::sync::Arc;

/// Represents the state of a transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Scope is open and accepting operations
    Active,
    /// Scope was committed
    Committed,
    /// Scope was rolled back, explicitly or by being dropped
    Aborted,
}

/// Scoped transaction guard.
///
/// # Purpose
/// A `Transaction` is obtained from [`GraphStore::begin_transaction`] and must
/// be finished with [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback). A guard that goes out of scope while
/// still active rolls back, which covers early returns through `?` and
/// panics alike.
///
/// # Nesting
/// Guards nest. An inner commit is only made durable by the outermost
/// commit; an inner rollback dooms the whole transaction.
///
/// A transaction belongs to the thread that began it, so the guard is not
/// `Send`.
///
/// [`GraphStore::begin_transaction`]: crate::store::GraphStore::begin_transaction
pub struct Transaction {
    provider: Arc<dyn GraphStoreProvider>,
    state: TransactionState,
    _thread_bound: PhantomData<*const ()>,
}

impl Transaction {
    pub(crate) fn new(provider: Arc<dyn GraphStoreProvider>) -> Self {
        Transaction {
            provider,
            state: TransactionState::Active,
            _thread_bound: PhantomData,
        }
    }

    /// Commits this scope.
    pub fn commit(mut self) -> StrataResult<()> {
        self.state = TransactionState::Committed;
        self.provider.close_transaction(true)
    }

    /// Rolls this scope back.
    pub fn rollback(mut self) -> StrataResult<()> {
        self.state = TransactionState::Aborted;
        self.provider.close_transaction(false)
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            self.state = TransactionState::Aborted;
            if let Err(err) = self.provider.close_transaction(false) {
                log::error!("Failed to roll back dropped transaction: {}", err);
            }
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .finish()
    }
}
