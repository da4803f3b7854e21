//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It manages the dependency graph and schedules updates when
//! signals change.
//!
//! # How It Works
//!
//! 1. When a signal, memo or effect is created, it registers with the
//!    runtime and gets a node in the dependency graph.
//!
//! 2. When a memo or effect reads a signal, the read is recorded in the
//!    [`ReactiveContext`] and committed to the graph when the computation
//!    finishes.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Finds all dependent memos/effects
//!    b. Marks direct dependents "dirty" and the rest "maybe dirty"
//!    c. Queues effects in topological order
//!    d. Flushes the queue, unless a batch is open
//!
//! Memos are lazy: they are only marked, and recompute on the next read.
//!
//! # Threading
//!
//! The runtime is thread-local. Reactive values are meant to be created,
//! read and written on one thread, the same way the DOM they drive is.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use tracing::{error, trace};

use super::context::ReactiveContext;
use crate::graph::{DirtyState, Node, NodeId, NodeKind, UpdateScheduler};

/// Upper bound on effect runs in one flush before we assume a cycle.
const MAX_FLUSH_RUNS: usize = 100_000;

/// A trait for computations the runtime can bring up to date.
pub trait Reactive: Send + Sync {
    /// Get the graph node for this reactive value.
    fn node_id(&self) -> NodeId;

    /// Bring this value up to date.
    ///
    /// Memos recompute if an input actually changed; effects re-run their
    /// body. Clean nodes do nothing.
    fn update(&self);
}

enum Entry {
    /// Kept alive by the runtime until unregistered (effects, listeners).
    Retained(Arc<dyn Reactive>),
    /// Alive only while user handles exist (memos).
    Weak(Weak<dyn Reactive>),
}

impl Entry {
    fn upgrade(&self) -> Option<Arc<dyn Reactive>> {
        match self {
            Entry::Retained(reactive) => Some(Arc::clone(reactive)),
            Entry::Weak(weak) => weak.upgrade(),
        }
    }
}

struct RuntimeState {
    graph: UpdateScheduler,
    registry: HashMap<NodeId, Entry>,
    pending: IndexSet<NodeId>,
    batch_depth: usize,
    flushing: bool,
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            graph: UpdateScheduler::new(),
            registry: HashMap::new(),
            pending: IndexSet::new(),
            batch_depth: 0,
            flushing: false,
        }
    }
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::new());
}

fn with_runtime<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

/// Variant used from `Drop` impls, where the thread-local may already be
/// gone or (during unwinding) still borrowed.
fn try_with_runtime<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> Option<R> {
    RUNTIME
        .try_with(|rt| rt.try_borrow_mut().ok().map(|mut state| f(&mut state)))
        .ok()
        .flatten()
}

/// The reactive runtime.
///
/// All functions operate on the current thread's runtime.
pub struct Runtime;

impl Runtime {
    /// Register a signal.
    pub fn register_source(id: NodeId) {
        with_runtime(|rt| {
            rt.graph.add_node(Node::with_id(id, NodeKind::Source));
        });
    }

    /// Register a memo, effect or listener.
    ///
    /// With `retain` the runtime keeps the value alive until it is
    /// unregistered; otherwise it is held weakly.
    pub fn register(reactive: Arc<dyn Reactive>, kind: NodeKind, retain: bool) {
        let id = reactive.node_id();
        let entry = if retain {
            Entry::Retained(reactive)
        } else {
            Entry::Weak(Arc::downgrade(&reactive))
        };
        with_runtime(|rt| {
            rt.graph.add_node(Node::with_id(id, kind));
            rt.registry.insert(id, entry);
        });
    }

    /// Remove a node from the graph and drop the runtime's reference to it.
    pub fn unregister(id: NodeId) {
        let entry = try_with_runtime(|rt| {
            rt.graph.remove_node(id);
            rt.pending.shift_remove(&id);
            rt.registry.remove(&id)
        });
        // Dropped here, outside the borrow: it may release the last handle
        // of a value whose own drop unregisters more nodes.
        drop(entry);
    }

    /// Record a read of `id` in the running computation, if any.
    pub fn track(id: NodeId) {
        if ReactiveContext::is_tracking() {
            let version = with_runtime(|rt| rt.graph.version(id));
            ReactiveContext::track_dependency(id, version);
        }
    }

    /// Store the dependencies collected during a run of `id` and mark it
    /// clean.
    pub fn commit<I>(id: NodeId, dependencies: I)
    where
        I: IntoIterator<Item = (NodeId, u64)>,
    {
        with_runtime(|rt| {
            rt.graph.replace_dependencies(id, dependencies);
            rt.graph.mark_clean(id);
        });
    }

    /// Propagate a change of the signal `id` and run affected effects.
    pub fn notify_change(id: NodeId) {
        let batching = with_runtime(|rt| {
            let affected = rt.graph.mark_changed(id);
            for node in affected {
                if rt.graph.kind(node) == Some(NodeKind::Effect) {
                    rt.pending.insert(node);
                }
            }
            rt.batch_depth > 0
        });

        if !batching {
            Self::flush();
        }
    }

    /// Decide whether `id` really has to recompute.
    ///
    /// Dirty nodes always do. Maybe-dirty nodes first bring their derived
    /// dependencies up to date, then compare the versions they observed
    /// with the current ones.
    pub fn needs_update(id: NodeId) -> bool {
        match Self::dirty_state(id) {
            DirtyState::Clean => false,
            DirtyState::Dirty => true,
            DirtyState::MaybeDirty => {
                let observed = with_runtime(|rt| rt.graph.observed_dependencies(id));
                for (dependency, seen) in observed {
                    if Self::kind(dependency) == Some(NodeKind::Derived) {
                        if let Some(reactive) = Self::lookup(dependency) {
                            reactive.update();
                        }
                    }
                    if Self::version(dependency) != seen {
                        return true;
                    }
                }
                false
            }
        }
    }

    /// Run queued effects until the queue is empty.
    ///
    /// Re-entrant calls (an effect writing a signal) return immediately;
    /// the outer loop picks up whatever they queued.
    pub fn flush() {
        let already_flushing = with_runtime(|rt| std::mem::replace(&mut rt.flushing, true));
        if already_flushing {
            return;
        }
        let _guard = FlushGuard;

        trace!("flushing reactive updates");
        let mut runs = 0usize;
        loop {
            let Some(id) = with_runtime(|rt| rt.pending.shift_remove_index(0)) else {
                break;
            };
            let Some(reactive) = Self::lookup(id) else {
                continue;
            };

            runs += 1;
            if runs > MAX_FLUSH_RUNS {
                error!(
                    runs,
                    "reactive flush did not settle; an effect is probably writing to its own dependency"
                );
                with_runtime(|rt| rt.pending.clear());
                break;
            }

            reactive.update();
        }
        trace!(runs, "flush complete");
    }

    /// Open a batch. Notifications are queued until the matching
    /// [`end_batch`](Self::end_batch).
    pub fn start_batch() {
        with_runtime(|rt| rt.batch_depth += 1);
    }

    /// Close a batch, returning `true` if it was the outermost one.
    pub fn end_batch() -> bool {
        try_with_runtime(|rt| {
            rt.batch_depth = rt.batch_depth.saturating_sub(1);
            rt.batch_depth == 0
        })
        .unwrap_or(false)
    }

    /// Check if a batch is open.
    pub fn is_batching() -> bool {
        with_runtime(|rt| rt.batch_depth > 0)
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<NodeId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if reads are currently tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_tracking()
    }

    /// Dirty state of a node.
    pub fn dirty_state(id: NodeId) -> DirtyState {
        with_runtime(|rt| rt.graph.dirty_state(id))
    }

    /// Mark a node clean without running it.
    pub fn mark_clean(id: NodeId) {
        with_runtime(|rt| rt.graph.mark_clean(id));
    }

    /// Current version of a node.
    pub fn version(id: NodeId) -> u64 {
        with_runtime(|rt| rt.graph.version(id))
    }

    /// Record that a derived node produced a new value.
    pub fn bump_version(id: NodeId) {
        with_runtime(|rt| rt.graph.bump_version(id));
    }

    /// Kind of a registered node.
    pub fn kind(id: NodeId) -> Option<NodeKind> {
        with_runtime(|rt| rt.graph.kind(id))
    }

    /// Check whether a node is still part of the graph.
    pub fn contains(id: NodeId) -> bool {
        with_runtime(|rt| rt.graph.contains(id))
    }

    /// Number of nodes `id` currently depends on.
    pub fn dependency_count(id: NodeId) -> usize {
        with_runtime(|rt| {
            rt.graph
                .get_node(id)
                .map(|node| node.dependencies().len())
                .unwrap_or(0)
        })
    }

    /// Number of nodes currently depending on `id`.
    pub fn dependent_count(id: NodeId) -> usize {
        with_runtime(|rt| {
            rt.graph
                .get_node(id)
                .map(|node| node.dependents().len())
                .unwrap_or(0)
        })
    }

    /// Number of nodes alive in this thread's graph.
    pub fn node_count() -> usize {
        with_runtime(|rt| rt.graph.node_count())
    }

    fn lookup(id: NodeId) -> Option<Arc<dyn Reactive>> {
        with_runtime(|rt| rt.registry.get(&id).and_then(Entry::upgrade))
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        try_with_runtime(|rt| rt.flushing = false);
    }
}
