//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued and re-run when the
//!    runtime flushes (immediately, or at the end of the outermost batch).
//!
//! 3. Before re-running, the effect runs its cleanups, disposes effects it
//!    created on the previous run, and drops its old dependencies.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! Call [`on_cleanup`](super::on_cleanup) inside the effect body to register
//! teardown work (event listeners, timers) that runs before the next run and
//! on disposal.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

use super::context::ReactiveContext;
use super::owner::Owner;
use super::runtime::{Reactive, Runtime};
use crate::graph::{NodeId, NodeKind};

struct EffectInner {
    id: NodeId,
    run: Box<dyn Fn() + Send + Sync>,
    owner: Owner,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        self.owner.cleanup();

        trace!(effect = self.id.raw(), "running effect");
        let ((), dependencies) = self
            .owner
            .with(|| ReactiveContext::run(self.id, || (self.run)()));
        Runtime::commit(self.id, dependencies);

        self.run_count.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.owner.dispose();
        Runtime::unregister(self.id);
    }
}

impl Reactive for EffectInner {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn update(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if Runtime::needs_update(self.id) {
            self.execute();
        } else {
            Runtime::mark_clean(self.id);
        }
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// The effect lives until [`dispose`](Effect::dispose) is called or the
/// owner it was created in is disposed; dropping the handle does not stop
/// it.
///
/// # Example
///
/// ```rust
/// use philjs_core::reactive::{Effect, Signal};
/// use std::sync::{Arc, Mutex};
///
/// let count = Signal::new(0);
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let (c, s) = (count.clone(), seen.clone());
/// let effect = Effect::new(move || {
///     s.lock().unwrap().push(c.get());
/// });
///
/// count.set(5);
/// assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let parent = Owner::current();
        let inner = Arc::new(EffectInner {
            id: NodeId::new(),
            run: Box::new(run),
            owner: Owner::new(),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        Runtime::register(inner.clone(), NodeKind::Effect, true);

        if let Some(parent) = parent {
            let weak = Arc::downgrade(&inner);
            parent.on_cleanup(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.dispose();
                }
            });
        }

        inner.execute();

        Self { inner }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Dispose of the effect.
    ///
    /// Runs its cleanups, disposes nested effects, and removes it from the
    /// graph. After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies collected on the last run.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.id)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect. Shorthand for [`Effect::new`].
pub fn effect<F>(run: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(run)
}
