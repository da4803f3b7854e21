//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked dirty (or maybe dirty,
//!    when the change came through another memo). Nothing is recomputed yet.
//!
//! 4. On next access, a maybe-dirty memo re-checks whether its inputs
//!    actually changed. If they did, it recomputes; otherwise it is marked
//!    clean and returns the cache.
//!
//! 5. A recomputation that yields an equal value does not bump the memo's
//!    version, so its own dependents do not re-run.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use super::context::ReactiveContext;
use super::owner::Owner;
use super::runtime::{Reactive, Runtime};
use crate::graph::{DirtyState, NodeId, NodeKind};

struct MemoInner<T> {
    id: NodeId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    equals: Box<dyn Fn(&T, &T) -> bool + Send + Sync>,
    value: RwLock<Option<T>>,
    computing: AtomicBool,
    disposed: AtomicBool,
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn recompute(&self) {
        self.computing.store(true, Ordering::SeqCst);
        let _reset = ResetFlag(&self.computing);

        let (new_value, dependencies) = ReactiveContext::run(self.id, || (self.compute)());
        Runtime::commit(self.id, dependencies);

        let changed = {
            let mut current = self.value.write();
            let same = current
                .as_ref()
                .is_some_and(|old| (self.equals)(old, &new_value));
            if !same {
                *current = Some(new_value);
            }
            !same
        };
        if changed {
            Runtime::bump_version(self.id);
        }
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            Runtime::unregister(self.id);
        }
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn update(&self) {
        if self.computing.load(Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if Runtime::needs_update(self.id) {
            self.recompute();
        } else {
            Runtime::mark_clean(self.id);
        }
    }
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

struct ResetFlag<'a>(&'a AtomicBool);

impl Drop for ResetFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// [`Memo::new`] compares recomputed values with `PartialEq` so that an
/// equal result does not wake dependents. [`Memo::with_compare`] takes the
/// comparison as a closure instead.
///
/// ```rust
/// use philjs_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let c = count.clone();
/// let doubled = Memo::new(move || c.get() * 2);
/// assert_eq!(doubled.get(), 4);
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    /// A memo created inside an owner stops tracking when the owner is
    /// disposed; it then keeps returning its last value.
    pub fn new<F>(compute: F) -> Self
    where
        T: PartialEq,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_compare(compute, |old, new| old == new)
    }

    /// Create a memo that treats a recomputed value as unchanged when
    /// `equals(old, new)` holds. The old value is then kept and dependents
    /// are not notified.
    ///
    /// ```rust
    /// use philjs_core::reactive::{Memo, Signal};
    ///
    /// let items = Signal::new(vec![1, 2, 3]);
    /// let i = items.clone();
    /// let snapshot = Memo::with_compare(move || i.get(), |a, b| a.len() == b.len());
    /// assert_eq!(snapshot.get(), vec![1, 2, 3]);
    ///
    /// items.set(vec![4, 5, 6]);
    /// assert_eq!(snapshot.get(), vec![1, 2, 3]);
    /// ```
    pub fn with_compare<F, C>(compute: F, equals: C) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        C: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let inner = Arc::new(MemoInner {
            id: NodeId::new(),
            compute: Box::new(compute),
            equals: Box::new(equals),
            value: RwLock::new(None),
            computing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });
        Runtime::register(inner.clone(), NodeKind::Derived, false);

        if let Some(owner) = Owner::current() {
            let weak = Arc::downgrade(&inner);
            owner.on_cleanup(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.dispose();
                }
            });
        }

        Self { inner }
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the memo reads itself while computing.
    pub fn get(&self) -> T {
        if self.inner.disposed.load(Ordering::SeqCst) && !self.has_value() {
            // Never computed before its owner went away.
            let value = {
                let _untracked = ReactiveContext::untracked();
                (self.inner.compute)()
            };
            *self.inner.value.write() = Some(value);
        }

        self.inner.update();
        Runtime::track(self.inner.id);

        match self.inner.value.read().clone() {
            Some(value) => value,
            None => {
                error!(memo = self.inner.id.raw(), "memo read itself while computing");
                panic!("cyclic memo dependency detected");
            }
        }
    }

    /// Get the current value without tracking it as a dependency.
    pub fn get_untracked(&self) -> T {
        let _untracked = ReactiveContext::untracked();
        self.get()
    }

    /// Get the current dirty state.
    pub fn state(&self) -> DirtyState {
        Runtime::dirty_state(self.inner.id)
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Get the number of computations depending on this memo.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.inner.id)
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

/// Create a memo. Shorthand for [`Memo::new`].
pub fn memo<T, F>(compute: F) -> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Memo::new(compute)
}

/// Shorthand for [`Memo::with_compare`].
pub fn memo_with_compare<T, F, C>(compute: F, equals: C) -> Memo<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
    C: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    Memo::with_compare(compute, equals)
}
