//! DOM events.

use std::cell::Cell;

use super::DomId;

/// An event travelling from its target up through the ancestors.
#[derive(Debug)]
pub struct Event {
    kind: String,
    value: Option<String>,
    target: Cell<Option<DomId>>,
    current_target: Cell<Option<DomId>>,
    stopped: Cell<bool>,
}

impl Event {
    /// Create an event of the given type, e.g. `"click"`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: None,
            target: Cell::new(None),
            current_target: Cell::new(None),
            stopped: Cell::new(false),
        }
    }

    /// Attach a value, as an `input` event carries the field's text.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> Option<DomId> {
        self.target.get()
    }

    /// The node whose listener is running.
    pub fn current_target(&self) -> Option<DomId> {
        self.current_target.get()
    }

    /// Keep the event from reaching further ancestors. Listeners on the
    /// current node still run.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub(crate) fn set_target(&self, target: DomId) {
        self.target.set(Some(target));
    }

    pub(crate) fn set_current_target(&self, node: DomId) {
        self.current_target.set(Some(node));
    }
}
