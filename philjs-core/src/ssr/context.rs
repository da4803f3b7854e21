//! Per-render server context.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::html::{render_scoped, render_to_string_with_options};
use super::state::HydrationState;
use crate::config::RenderOptions;
use crate::error::Result;
use crate::reactive::{provide_context, use_context, Signal};
use crate::view::VNode;

#[derive(Default)]
struct SsrData {
    state: HydrationState,
    head: Vec<String>,
}

/// Data collected while rendering one page on the server.
///
/// During [`render_to_string_with_context`] the context is reachable from
/// components through [`SsrContext::current`].
#[derive(Clone, Default)]
pub struct SsrContext {
    inner: Arc<Mutex<SsrData>>,
}

impl SsrContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The context of the render in progress, if any.
    pub fn current() -> Option<SsrContext> {
        use_context::<SsrContext>()
    }

    /// Serialize the signal's current value for the client.
    pub fn register_signal<T>(&self, key: impl Into<String>, signal: &Signal<T>) -> Result<()>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let value = signal.get_untracked();
        self.inner.lock().state.insert(key, &value)
    }

    /// Store an arbitrary serializable value for the client.
    pub fn insert_state<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        self.inner.lock().state.insert(key, value)
    }

    /// Add raw HTML to the document head.
    pub fn add_head(&self, html: impl Into<String>) {
        self.inner.lock().head.push(html.into());
    }

    pub fn head_html(&self) -> String {
        self.inner.lock().head.concat()
    }

    pub fn state(&self) -> HydrationState {
        self.inner.lock().state.clone()
    }

    /// The state script tag, or an empty string when nothing was recorded.
    pub fn state_script(&self) -> Result<String> {
        let state = self.state();
        if state.is_empty() {
            Ok(String::new())
        } else {
            state.to_script()
        }
    }
}

impl std::fmt::Debug for SsrContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.lock();
        f.debug_struct("SsrContext")
            .field("signals", &data.state.signals.len())
            .field("head", &data.head.len())
            .finish()
    }
}

/// Render with an [`SsrContext`] available to components.
pub fn render_to_string_with_context(node: &VNode) -> (String, SsrContext) {
    let context = SsrContext::new();
    let provided = context.clone();
    let html = render_scoped(&RenderOptions::default(), move |renderer| {
        provide_context(provided);
        renderer.node(node);
    });
    (html, context)
}

/// Render a complete HTML document: collected head elements, the body
/// markup, and the serialized state.
pub fn render_to_document(node: &VNode) -> Result<String> {
    let (body, context) = render_to_string_with_context(node);
    Ok(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">{}</head><body>{}{}</body></html>",
        context.head_html(),
        body,
        context.state_script()?
    ))
}

/// Render without markers, for pages that are never hydrated.
pub fn render_static(node: &VNode) -> String {
    render_to_string_with_options(node, &RenderOptions::new().hydratable(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{component, jsx, Props};

    #[test]
    fn components_see_the_context() {
        let counter = component(|_: &Props| {
            let count = Signal::new(5);
            if let Some(ctx) = SsrContext::current() {
                ctx.register_signal("count", &count).unwrap();
                ctx.add_head("<title>Counter</title>");
            }
            jsx("span", Props::new().child(count.get_untracked()), None)
        });

        let (html, ctx) = render_to_string_with_context(&jsx(counter, Props::new(), None));
        assert_eq!(html, "<span>5</span>");
        assert_eq!(ctx.state().get::<i32>("count").unwrap(), Some(5));
        assert_eq!(ctx.head_html(), "<title>Counter</title>");
    }

    #[test]
    fn context_is_absent_outside_renders() {
        assert!(SsrContext::current().is_none());
    }

    #[test]
    fn document_contains_state_script() {
        let app = component(|_: &Props| {
            if let Some(ctx) = SsrContext::current() {
                ctx.insert_state("user", &"ada").unwrap();
            }
            "hello"
        });
        let page = render_to_document(&jsx(app, Props::new(), None)).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<body>hello<script type=\"application/json\" id=\"__philjs_state\">"));
    }
}
