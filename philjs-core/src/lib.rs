//! PhilJS Core
//!
//! This crate provides the core runtime for the PhilJS UI framework.
//! It implements:
//!
//! - Fine-grained reactive primitives (signals, memos, effects, owners)
//! - A JSX runtime producing virtual node trees
//! - Server-side rendering with hydration markers and serialized state
//! - Hydration of server-rendered DOM and client-side rendering
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Dependency graph with push-dirty, pull-version propagation
//! - `reactive`: Signals, memos, effects, batching and ownership scopes
//! - `view`: VNodes, props and the `jsx` factories
//! - `ssr`: HTML rendering, SSR context and hydration state
//! - `dom`: A small in-memory DOM used as the client render target
//! - `render` and `hydrate`: Binding VNode trees to a live document
//!
//! # Example
//!
//! ```rust
//! use philjs_core::reactive::{Effect, Memo, Signal};
//!
//! let count = Signal::new(0);
//!
//! let doubled = {
//!     let count = count.clone();
//!     Memo::new(move || count.get() * 2)
//! };
//!
//! let _effect = {
//!     let doubled = doubled.clone();
//!     Effect::new(move || {
//!         println!("Doubled: {}", doubled.get());
//!     })
//! };
//!
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod graph;
pub mod hydrate;
pub mod reactive;
pub mod render;
pub mod ssr;
pub mod view;

pub use config::RenderOptions;
pub use error::{Error, HydrationError, Result};
pub use hydrate::hydrate;
pub use render::{render, Mount};
pub use ssr::{render_to_string, HydrationState, SsrContext};
pub use view::{jsx, VNode};

/// Everything needed to write components.
pub mod prelude {
    pub use crate::reactive::{
        batch, create_resource, create_root, create_rw_signal, create_signal,
        create_stored_value, create_trigger, effect, memo, memo_with_compare, on_cleanup,
        provide_context, signal, untrack, use_context, Effect, Memo, ReadSignal, Resource,
        ResourceState, RwSignal, Signal, StoredValue, Trigger, WriteSignal,
    };
    pub use crate::view::{
        component, dynamic, dynamic_attr, fragment, jsx, AttrValue, Child, Component, Props,
        VNode,
    };
}
