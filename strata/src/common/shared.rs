use std::sync::Arc;

use parking_lot::RwLock;

/// A value shared between handles and guarded by a reader-writer lock.
pub type Shared<T> = Arc<RwLock<T>>;

#[inline]
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Scoped lock access that keeps guards from escaping the closure.
///
/// The lock is not reentrant: calling back into the same value from inside
/// the closure deadlocks.
pub trait LockScope<T: ?Sized> {
    fn with_read<R>(&self, f: impl FnOnce(&T) -> R) -> R;

    fn with_write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
}

impl<T> LockScope<T> for Shared<T> {
    #[inline]
    fn with_read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.read())
    }

    #[inline]
    fn with_write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.write())
    }
}
