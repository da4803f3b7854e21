//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    read is recorded and the computation becomes a dependent.
//!
//! 2. When a signal's value changes, the runtime marks dependents and runs
//!    the affected effects.
//!
//! 3. Listeners registered with [`Signal::subscribe`] are notified through
//!    the same scheduling, so they respect [`batch`](super::batch).
//!
//! # Identity
//!
//! Clones share the value. Two handles compare equal when they refer to the
//! same signal, never by value.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime};
use crate::graph::{DirtyState, NodeId, NodeKind};

struct SignalInner<T> {
    id: NodeId,
    value: RwLock<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use philjs_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        let id = NodeId::new();
        Runtime::register_source(id);
        Self {
            inner: Arc::new(SignalInner {
                id,
                value: RwLock::new(value),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> T {
        Runtime::track(self.inner.id);
        self.inner.value.read().clone()
    }

    /// Borrow the current value without cloning it. Tracked like
    /// [`get`](Self::get).
    ///
    /// Writing to this signal from inside `f` deadlocks.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.inner.id);
        f(&self.inner.value.read())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Alias of [`get_untracked`](Self::get_untracked).
    pub fn peek(&self) -> T {
        self.get_untracked()
    }

    /// Set a new value and notify dependents.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        Runtime::notify_change(self.inner.id);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Mutate the value in place and notify dependents.
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        f(&mut self.inner.value.write());
        Runtime::notify_change(self.inner.id);
    }

    /// Call `notify` with the new value after every write.
    ///
    /// The listener is removed when the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let weak: Weak<SignalInner<T>> = Arc::downgrade(&self.inner);
        let listener = Arc::new(Listener {
            id: NodeId::new(),
            source: self.inner.id,
            notify: Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let value = inner.value.read().clone();
                    notify(&value);
                }
            }),
        });
        let id = listener.id;
        Runtime::register(listener, NodeKind::Effect, true);
        Runtime::commit(id, [(self.inner.id, Runtime::version(self.inner.id))]);
        Subscription { id }
    }

    /// Get the number of computations and listeners depending on this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::dependent_count(self.inner.id)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Eq for Signal<T> where T: Clone + Send + Sync + 'static {}

impl<T> Default for Signal<T>
where
    T: Clone + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Create a signal. Shorthand for [`Signal::new`].
pub fn signal<T>(value: T) -> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    Signal::new(value)
}

struct Listener {
    id: NodeId,
    source: NodeId,
    notify: Box<dyn Fn() + Send + Sync>,
}

impl Reactive for Listener {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn update(&self) {
        if Runtime::dirty_state(self.id) == DirtyState::Clean {
            return;
        }
        {
            let _untracked = ReactiveContext::untracked();
            (self.notify)();
        }
        Runtime::commit(self.id, [(self.source, Runtime::version(self.source))]);
    }
}

/// Handle for a listener registered with [`Signal::subscribe`].
#[must_use = "dropping a Subscription removes the listener"]
#[derive(Debug)]
pub struct Subscription {
    id: NodeId,
}

impl Subscription {
    /// Remove the listener.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Check whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        Runtime::contains(self.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}
