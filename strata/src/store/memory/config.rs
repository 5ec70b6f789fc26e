/// Configuration for an in-memory store.
///
/// # Purpose
/// `InMemoryStoreConfig` controls how strictly the store enforces transaction
/// scopes and how much capacity the arena reserves up front.
///
/// # Usage
/// ```rust
/// use strata::store::memory::{InMemoryGraphStore, InMemoryStoreConfig};
///
/// let config = InMemoryStoreConfig::new()
///     .with_strict_transactions(false)
///     .with_initial_capacity(1024);
/// let store = InMemoryGraphStore::new(config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryStoreConfig {
    strict_transactions: bool,
    initial_capacity: usize,
}

impl InMemoryStoreConfig {
    /// Creates a config with strict transactions and no reserved capacity.
    pub fn new() -> InMemoryStoreConfig {
        InMemoryStoreConfig {
            strict_transactions: true,
            initial_capacity: 0,
        }
    }

    /// When strict (the default), writes outside a transaction fail with
    /// `ErrorKind::NotInTransaction`. When relaxed they are applied directly
    /// and cannot be rolled back.
    pub fn with_strict_transactions(mut self, strict: bool) -> Self {
        self.strict_transactions = strict;
        self
    }

    /// Number of record and edge slots reserved when the store is created.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn strict_transactions(&self) -> bool {
        self.strict_transactions
    }

    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        InMemoryStoreConfig::new()
    }
}
