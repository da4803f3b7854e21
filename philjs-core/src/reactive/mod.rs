//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives form the foundation of PhilJS's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes, and only when something reads it.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems,
//! such as updating the DOM or logging.
//!
//! ## Resources
//!
//! A [`Resource`] is async data keyed by a reactive source. It reports
//! `Loading`, `Ready` or `Error` through a signal and queues a new fetch
//! whenever its source changes.
//!
//! ## Owners
//!
//! Effects, cleanups and context values belong to the [`Owner`] that was
//! current when they were created. Disposing an owner tears all of them down.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, record the dependency together with the
//! version that was observed.

mod batch;
mod context;
mod effect;
mod handles;
mod memo;
mod owner;
mod resource;
mod runtime;
mod signal;
mod stored;
mod trigger;

pub use batch::{batch, untrack};
pub use context::{Dependencies, ReactiveContext};
pub use effect::{effect, Effect};
pub use handles::{create_rw_signal, create_signal, ReadSignal, RwSignal, WriteSignal};
pub use memo::{memo, memo_with_compare, Memo};
pub use owner::{create_root, on_cleanup, provide_context, use_context, Owner, RootHandle};
pub use resource::{create_resource, Resource, ResourceState};
pub use runtime::{Reactive, Runtime};
pub use signal::{signal, Signal, Subscription};
pub use stored::{create_stored_value, StoredValue};
pub use trigger::{create_trigger, Trigger};

pub use crate::graph::{DirtyState, NodeId, NodeKind};
