//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or effect), we push
//! the subscriber onto the stack. When the computation completes, we pop it.
//!
//! An untracked frame (pushed by [`untrack`](super::untrack)) has no
//! subscriber, so reads inside it are not recorded anywhere.

use std::cell::RefCell;

use smallvec::SmallVec;

use crate::graph::NodeId;

/// Dependencies collected during one run: `(node, version observed)`.
pub type Dependencies = SmallVec<[(NodeId, u64); 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The computation being run, `None` for an untracked frame.
    subscriber: Option<NodeId>,
    /// Dependencies collected during this computation.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber: Option<NodeId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// The context is automatically exited when the returned guard is dropped.
    pub fn enter(subscriber: NodeId) -> Self {
        Self::push(Some(subscriber))
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber: Option<NodeId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                dependencies: Dependencies::new(),
            });
        });
        Self { subscriber }
    }

    /// Run `f` as the computation `subscriber`, returning its result and the
    /// dependencies it read.
    pub fn run<R>(subscriber: NodeId, f: impl FnOnce() -> R) -> (R, Dependencies) {
        let ctx = Self::enter(subscriber);
        let result = f();
        let dependencies = Self::take_dependencies();
        drop(ctx);
        (result, dependencies)
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber))
    }

    /// Record a read of `node` at `version`.
    ///
    /// This is called by signals and memos when they are read. Repeated reads
    /// of the same node keep the first observed version.
    pub fn track_dependency(node: NodeId, version: u64) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber.is_none() {
                    return;
                }
                if !entry.dependencies.iter().any(|(id, _)| *id == node) {
                    entry.dependencies.push((node, version));
                }
            }
        });
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }

    fn take_dependencies() -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber, self.subscriber,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber, entry.subscriber
                );
            }
        });
    }
}
