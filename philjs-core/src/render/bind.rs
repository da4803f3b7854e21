//! Attribute and listener bindings shared by rendering and hydration.

use crate::dom::{Document, DomId};
use crate::reactive::{on_cleanup, Effect};
use crate::view::{attribute_name, event_name, is_reserved_prop, AttrValue, Props};

/// Attach the props of an element to a live node.
///
/// Handlers become listeners and dynamic values get an effect. Static
/// values are written only when `write_static` is set; hydration leaves
/// them as the server rendered them. Everything is undone when the current
/// owner is cleaned up.
pub(crate) fn bind_props(document: &Document, element: DomId, props: &Props, write_static: bool) {
    for (name, value) in props.attrs() {
        if is_reserved_prop(name) {
            continue;
        }

        if let AttrValue::Handler(handler) = value {
            if let Some(event) = event_name(name) {
                let listener = document.add_event_listener(element, &event, handler.clone());
                let document = document.clone();
                on_cleanup(move || document.remove_event_listener(element, listener));
            }
            continue;
        }
        if event_name(name).is_some() {
            continue;
        }

        let attribute = attribute_name(name).to_string();
        match value {
            AttrValue::Dynamic(accessor) => {
                let document = document.clone();
                let accessor = accessor.clone();
                Effect::new(move || {
                    let value = accessor.get();
                    apply_attribute(&document, element, &attribute, &value);
                });
            }
            other if write_static => apply_attribute(document, element, &attribute, other),
            _ => {}
        }
    }
}

fn apply_attribute(document: &Document, element: DomId, name: &str, value: &AttrValue) {
    match value.to_attribute() {
        Some(text) => document.set_attribute(element, name, &text),
        None => document.remove_attribute(element, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Event;
    use crate::reactive::{create_root, Signal};
    use crate::view::dynamic_attr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn static_dynamic_and_handler_props() {
        let document = Document::new();
        let button = document.create_element("button");
        let disabled = Signal::new(false);
        let clicks = Arc::new(AtomicUsize::new(0));

        let props = {
            let d = disabled.clone();
            let c = clicks.clone();
            Props::new()
                .attr("className", "btn")
                .attr("disabled", dynamic_attr(move || d.get()))
                .on("click", move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                })
        };

        let root = create_root(|root| {
            bind_props(&document, button, &props, true);
            root
        });
        assert_eq!(document.get_attribute(button, "class").as_deref(), Some("btn"));
        assert_eq!(document.get_attribute(button, "disabled"), None);

        disabled.set(true);
        assert_eq!(document.get_attribute(button, "disabled").as_deref(), Some(""));

        document.dispatch_event(button, Event::new("click"));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);

        root.dispose();
        assert_eq!(document.listener_count(button), 0);
        disabled.set(false);
        assert_eq!(document.get_attribute(button, "disabled").as_deref(), Some(""));
    }

    #[test]
    fn hydration_does_not_write_static_values() {
        let document = Document::new();
        let div = document.create_element("div");
        let props = Props::new().attr("id", "server");
        let root = create_root(|root| {
            bind_props(&document, div, &props, false);
            root
        });
        assert_eq!(document.get_attribute(div, "id"), None);
        root.dispose();
    }
}
