//! Non-reactive shared storage.

use std::sync::Arc;

use parking_lot::RwLock;

/// A shared value that never tracks reads or notifies on writes.
///
/// Useful for state a component needs across runs (caches, handles, counters)
/// that should not cause anything to re-run.
pub struct StoredValue<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> StoredValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.read().clone()
    }

    pub fn set(&self, value: T) {
        *self.inner.write() = value;
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.write());
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// `None` while a writer holds the value.
    pub fn try_get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.try_read().map(|value| value.clone())
    }

    /// `false` while the value is borrowed.
    pub fn try_set(&self, value: T) -> bool {
        match self.inner.try_write() {
            Some(mut slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl<T> Clone for StoredValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for StoredValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StoredValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoredValue").field(&*self.inner.read()).finish()
    }
}

pub fn create_stored_value<T>(value: T) -> StoredValue<T> {
    StoredValue::new(value)
}
