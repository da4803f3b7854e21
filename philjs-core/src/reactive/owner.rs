//! Ownership and disposal scopes.
//!
//! Every effect runs inside an [`Owner`]. Effects, cleanups and context
//! values created while an owner is current belong to it, and go away when
//! it is cleaned up (before an effect re-runs) or disposed.
//!
//! [`create_root`] opens a detached owner whose lifetime is controlled only
//! through its [`RootHandle`]. Renderers use it so that repeated renders
//! never leak effects.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::warn;

use super::batch::untrack;

type Cleanup = Box<dyn FnOnce() + Send>;

thread_local! {
    static CURRENT_OWNER: RefCell<Option<Owner>> = const { RefCell::new(None) };
}

struct OwnerInner {
    parent: Option<Weak<OwnerInner>>,
    cleanups: Mutex<Vec<Cleanup>>,
    contexts: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    disposed: AtomicBool,
}

/// A disposal scope.
#[derive(Clone)]
pub struct Owner {
    inner: Arc<OwnerInner>,
}

impl Owner {
    /// Create an owner whose parent is the current owner, if any.
    ///
    /// The parent is only used for context lookup; disposal is wired up by
    /// whoever creates the owner.
    pub fn new() -> Self {
        let parent = Self::current().map(|owner| Arc::downgrade(&owner.inner));
        Self {
            inner: Arc::new(OwnerInner {
                parent,
                cleanups: Mutex::new(Vec::new()),
                contexts: Mutex::new(HashMap::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// The owner that is current on this thread.
    pub fn current() -> Option<Owner> {
        CURRENT_OWNER.with(|owner| owner.borrow().clone())
    }

    /// Run `f` with this owner as the current one.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = CURRENT_OWNER.with(|owner| owner.replace(Some(self.clone())));
        let _restore = RestoreOwner(Some(previous));
        f()
    }

    /// Register a cleanup. If the owner is already disposed the cleanup
    /// runs immediately.
    pub fn on_cleanup(&self, f: impl FnOnce() + Send + 'static) {
        if self.is_disposed() {
            f();
            return;
        }
        self.inner.cleanups.lock().push(Box::new(f));
    }

    /// Run and forget every registered cleanup, newest first.
    ///
    /// The owner stays usable; this is what happens before an effect
    /// re-runs.
    pub fn cleanup(&self) {
        loop {
            let cleanups = std::mem::take(&mut *self.inner.cleanups.lock());
            if cleanups.is_empty() {
                break;
            }
            untrack(|| {
                for cleanup in cleanups.into_iter().rev() {
                    cleanup();
                }
            });
        }
        self.inner.contexts.lock().clear();
    }

    /// Clean up and mark the owner as disposed.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cleanup();
    }

    /// Check if the owner has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Store a context value on this owner.
    pub fn provide<T>(&self, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.inner
            .contexts
            .lock()
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Look up a context value on this owner or the nearest ancestor.
    pub fn lookup<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut current = Some(Arc::clone(&self.inner));
        while let Some(owner) = current {
            let found = owner
                .contexts
                .lock()
                .get(&TypeId::of::<T>())
                .and_then(|value| value.downcast_ref::<T>().cloned());
            if found.is_some() {
                return found;
            }
            current = owner.parent.as_ref().and_then(Weak::upgrade);
        }
        None
    }

    /// Number of cleanups waiting to run.
    pub fn pending_cleanups(&self) -> usize {
        self.inner.cleanups.lock().len()
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Owner")
            .field("pending_cleanups", &self.pending_cleanups())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct RestoreOwner(Option<Option<Owner>>);

impl Drop for RestoreOwner {
    fn drop(&mut self) {
        if let Some(previous) = self.0.take() {
            let _ = CURRENT_OWNER.try_with(|owner| owner.replace(previous));
        }
    }
}

/// Handle to a scope created by [`create_root`].
#[derive(Clone, Debug)]
pub struct RootHandle {
    owner: Owner,
}

impl RootHandle {
    /// Dispose every effect, binding and cleanup created inside the root.
    pub fn dispose(&self) {
        self.owner.dispose();
    }

    /// Check whether the root has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.owner.is_disposed()
    }

    /// The root's owner, for running more code inside the same scope.
    pub fn owner(&self) -> &Owner {
        &self.owner
    }
}

/// Create a detached disposal scope and run `f` inside it, untracked.
///
/// Nothing created inside the root is disposed until
/// [`RootHandle::dispose`] is called, regardless of what the caller's own
/// scope does.
///
/// ```rust
/// use philjs_core::reactive::{create_root, effect, signal};
///
/// let count = signal(0);
/// let root = create_root(|root| {
///     let count = count.clone();
///     effect(move || {
///         let _ = count.get();
///     });
///     root
/// });
/// root.dispose();
/// ```
pub fn create_root<R>(f: impl FnOnce(RootHandle) -> R) -> R {
    let owner = Owner::new();
    let handle = RootHandle {
        owner: owner.clone(),
    };
    owner.with(|| untrack(|| f(handle)))
}

/// Register `f` to run when the current owner is cleaned up.
///
/// Inside an effect this is before the next run and on disposal.
pub fn on_cleanup(f: impl FnOnce() + Send + 'static) {
    match Owner::current() {
        Some(owner) => owner.on_cleanup(f),
        None => warn!("on_cleanup called outside of a reactive owner; it will never run"),
    }
}

/// Make `value` available to [`use_context`] calls below the current owner.
pub fn provide_context<T>(value: T)
where
    T: Clone + Send + Sync + 'static,
{
    match Owner::current() {
        Some(owner) => owner.provide(value),
        None => warn!(
            context = std::any::type_name::<T>(),
            "provide_context called outside of a reactive owner"
        ),
    }
}

/// Find the nearest context value of type `T`.
pub fn use_context<T>() -> Option<T>
where
    T: Clone + Send + Sync + 'static,
{
    Owner::current().and_then(|owner| owner.lookup::<T>())
}
