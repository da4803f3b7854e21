//! Batching and untracked reads.

use super::context::ReactiveContext;
use super::runtime::Runtime;

/// Batch multiple signal updates together.
///
/// Notifications are deferred until the outermost batch exits; every
/// affected effect then runs at most once.
///
/// ```rust
/// use philjs_core::reactive::{batch, signal};
///
/// let first = signal("John");
/// let last = signal("Doe");
///
/// batch(|| {
///     first.set("Jane");
///     last.set("Smith");
/// });
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::start_batch();
    let guard = BatchGuard { armed: true };
    let result = f();
    let outermost = guard.finish();
    if outermost {
        Runtime::flush();
    }
    result
}

/// Run `f` without registering any dependency in the current computation.
///
/// ```rust
/// use philjs_core::reactive::{effect, signal, untrack};
///
/// let count = signal(0);
/// let other = signal(0);
///
/// let (c, o) = (count.clone(), other.clone());
/// effect(move || {
///     let _ = c.get();
///     untrack(|| {
///         let _ = o.get();
///     });
/// });
/// ```
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}

struct BatchGuard {
    armed: bool,
}

impl BatchGuard {
    fn finish(mut self) -> bool {
        self.armed = false;
        Runtime::end_batch()
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        // Only reached with `armed` set while unwinding out of the batch.
        if self.armed {
            Runtime::end_batch();
        }
    }
}
