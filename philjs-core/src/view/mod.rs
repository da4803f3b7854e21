//! JSX Runtime
//!
//! Builders for the virtual node tree consumed by the server renderer,
//! hydration and the client renderer.
//!
//! # Example
//!
//! ```rust
//! use philjs_core::reactive::Signal;
//! use philjs_core::view::{dynamic, jsx, Props};
//!
//! let count = Signal::new(0);
//! let c = count.clone();
//! let node = jsx(
//!     "button",
//!     Props::new()
//!         .on("click", move |_| c.update(|n| n + 1))
//!         .child("Clicked ")
//!         .child(dynamic({
//!             let count = count.clone();
//!             move || count.get()
//!         })),
//!     None,
//! );
//! ```

mod jsx;
mod vnode;

pub use jsx::{component, dynamic, dynamic_attr, fragment, jsx, jsx_dev, jsxs};
pub use vnode::{
    attribute_name, event_name, format_number, is_reserved_prop, is_void_element,
    normalize_children, style_to_string, Accessor, AttrValue, Child, Component, EventHandler,
    NodeType, Props, VNode, VOID_ELEMENTS,
};
