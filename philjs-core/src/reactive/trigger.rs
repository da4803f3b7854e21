//! Valueless signals.

use super::signal::Signal;
use crate::graph::NodeId;

/// A signal without a value, for state that lives outside the reactive
/// system. Computations call [`track`](Trigger::track) to depend on it and
/// the owner of the state calls [`notify`](Trigger::notify) after changing it.
///
/// ```rust
/// use philjs_core::reactive::{effect, Trigger};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let changed = Trigger::new();
/// let runs = Arc::new(AtomicUsize::new(0));
/// let (t, r) = (changed.clone(), runs.clone());
/// effect(move || {
///     t.track();
///     r.fetch_add(1, Ordering::SeqCst);
/// });
///
/// changed.notify();
/// assert_eq!(runs.load(Ordering::SeqCst), 2);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Trigger {
    inner: Signal<()>,
}

impl Trigger {
    pub fn new() -> Self {
        Self {
            inner: Signal::new(()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id()
    }

    /// Register the current computation as a dependent.
    pub fn track(&self) {
        self.inner.with(|_| ());
    }

    /// Re-run every dependent.
    pub fn notify(&self) {
        self.inner.set(());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger").field("id", &self.id()).finish()
    }
}

pub fn create_trigger() -> Trigger {
    Trigger::new()
}
