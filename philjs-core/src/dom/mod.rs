//! In-process DOM
//!
//! A small document model that the client renderer and hydration drive:
//! elements with ordered attributes and event listeners, text and comment
//! nodes, event bubbling, and HTML serialization. [`Document::parse_html`]
//! builds it from server output with html5ever.
//!
//! Every change to the tree is counted, which makes "hydration did not
//! touch the DOM" a checkable property.

mod document;
mod event;
mod parse;

pub use document::{Document, DomId, DomNodeKind, ListenerId};
pub use event::Event;
