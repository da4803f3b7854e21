//! VNode to HTML string.

use tracing::trace;

use crate::config::RenderOptions;
use crate::reactive::{create_root, untrack};
use crate::view::{
    attribute_name, event_name, is_reserved_prop, is_void_element, AttrValue, Child, NodeType,
    Props, VNode,
};

/// Opening marker of a dynamic region.
pub const REGION_START: &str = "$";
/// Closing marker of a dynamic region.
pub const REGION_END: &str = "/$";

/// Render a VNode tree to HTML with hydration markers.
///
/// ```rust
/// use philjs_core::ssr::render_to_string;
/// use philjs_core::view::{jsx, Props};
///
/// let node = jsx("p", Props::new().class("note").child("1 < 2"), None);
/// assert_eq!(render_to_string(&node), r#"<p class="note">1 &lt; 2</p>"#);
/// ```
pub fn render_to_string(node: &VNode) -> String {
    render_to_string_with_options(node, &RenderOptions::default())
}

/// Render a VNode tree to HTML.
pub fn render_to_string_with_options(node: &VNode, options: &RenderOptions) -> String {
    render_scoped(options, |renderer| renderer.node(node))
}

/// Render a single child (text, node, region or list) to HTML.
pub fn render_child_to_string(child: &Child) -> String {
    render_scoped(&RenderOptions::default(), |renderer| renderer.child(child))
}

/// Render inside a throwaway root so that effects and memos created by
/// components do not outlive the render.
pub(crate) fn render_scoped(options: &RenderOptions, f: impl FnOnce(&mut HtmlRenderer)) -> String {
    let (html, root) = create_root(|root| {
        let mut renderer = HtmlRenderer::new(*options);
        f(&mut renderer);
        (renderer.finish(), root)
    });
    root.dispose();
    html
}

pub(crate) struct HtmlRenderer {
    out: String,
    hydratable: bool,
    last_was_text: bool,
}

impl HtmlRenderer {
    fn new(options: RenderOptions) -> Self {
        Self {
            out: String::new(),
            hydratable: options.hydratable,
            last_was_text: false,
        }
    }

    fn finish(self) -> String {
        self.out
    }

    pub(crate) fn child(&mut self, child: &Child) {
        match child {
            Child::Text(text) => self.text(text),
            Child::Node(node) => self.node(node),
            Child::Dynamic(accessor) => {
                let value = untrack(|| accessor.get());
                if self.hydratable {
                    self.comment(REGION_START);
                    self.child(&value);
                    self.comment(REGION_END);
                } else {
                    self.child(&value);
                }
            }
            Child::List(items) => {
                for item in items {
                    self.child(item);
                }
            }
            Child::Empty => {}
        }
    }

    pub(crate) fn node(&mut self, node: &VNode) {
        match &node.node_type {
            NodeType::Tag(tag) => self.element(tag, &node.props),
            NodeType::Fragment => self.children(node.children()),
            NodeType::Component(component) => {
                trace!(component = component.name(), "rendering component");
                let output = untrack(|| component.render(&node.props));
                self.child(&output);
            }
        }
    }

    fn children(&mut self, children: &[Child]) {
        for child in children {
            self.child(child);
        }
    }

    fn element(&mut self, tag: &str, props: &Props) {
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in props.attrs() {
            self.attribute(name, value);
        }
        self.out.push('>');
        self.last_was_text = false;

        if is_void_element(tag) {
            return;
        }

        // Only `innerHTML` is written unescaped, script and style included.
        match props.get("innerHTML").map(AttrValue::resolve) {
            Some(AttrValue::Text(html)) => self.out.push_str(&html),
            _ => self.children(props.child_nodes()),
        }

        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
        self.last_was_text = false;
    }

    fn attribute(&mut self, name: &str, value: &AttrValue) {
        if is_reserved_prop(name) || event_name(name).is_some() {
            return;
        }
        let value = untrack(|| value.resolve());
        match value {
            AttrValue::Bool(true) => {
                self.out.push(' ');
                self.out.push_str(attribute_name(name));
            }
            other => {
                if let Some(text) = other.to_attribute() {
                    self.out.push(' ');
                    self.out.push_str(attribute_name(name));
                    self.out.push_str("=\"");
                    self.out
                        .push_str(&html_escape::encode_double_quoted_attribute(&text));
                    self.out.push('"');
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.last_was_text && self.hydratable {
            // Keeps the browser from merging the two text nodes.
            self.out.push_str("<!---->");
        }
        self.out.push_str(&html_escape::encode_text(text));
        self.last_was_text = true;
    }

    fn comment(&mut self, text: &str) {
        self.out.push_str("<!--");
        self.out.push_str(text);
        self.out.push_str("-->");
        self.last_was_text = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, on_cleanup, Runtime, Signal};
    use crate::view::{component, dynamic, dynamic_attr, fragment, jsx};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn el(tag: &str, props: Props) -> VNode {
        jsx(tag, props, None)
    }

    #[test]
    fn escapes_text_and_attributes() {
        let node = el(
            "a",
            Props::new()
                .attr("href", "/search?q=a&b=\"c\"")
                .child("<script>alert(1)</script>"),
        );
        assert_eq!(
            render_to_string(&node),
            "<a href=\"/search?q=a&amp;b=&quot;c&quot;\">&lt;script&gt;alert(1)&lt;/script&gt;</a>"
        );
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let node = el(
            "div",
            Props::new()
                .child(el("br", Props::new()))
                .child(el("img", Props::new().attr("src", "a.png").child("ignored"))),
        );
        assert_eq!(render_to_string(&node), "<div><br><img src=\"a.png\"></div>");
    }

    #[test]
    fn boolean_and_null_attributes() {
        let node = el(
            "input",
            Props::new()
                .attr("disabled", true)
                .attr("checked", false)
                .attr("value", None::<&str>)
                .attr("maxlength", 10),
        );
        assert_eq!(render_to_string(&node), "<input disabled maxlength=\"10\">");
    }

    #[test]
    fn style_and_renamed_attributes() {
        let node = el(
            "label",
            Props::new()
                .attr("className", "field")
                .attr("htmlFor", "name")
                .style([("fontSize", "12px"), ("--accent", "red")]),
        );
        assert_eq!(
            render_to_string(&node),
            "<label class=\"field\" for=\"name\" style=\"font-size:12px;--accent:red\"></label>"
        );
    }

    #[test]
    fn handlers_key_and_ref_are_not_rendered() {
        let node = jsx(
            "button",
            Props::new()
                .on("click", |_| {})
                .attr("onClick", "ignored")
                .attr("ref", "r")
                .child("Go"),
            Some("k".into()),
        );
        assert_eq!(render_to_string(&node), "<button>Go</button>");
    }

    #[test]
    fn inner_html_is_raw() {
        let node = el(
            "div",
            Props::new().attr("innerHTML", "<b>bold</b>").child("dropped"),
        );
        assert_eq!(render_to_string(&node), "<div><b>bold</b></div>");
    }

    #[test]
    fn components_and_fragments() {
        let item = component(|props: &Props| {
            el("li", Props::new().child(props.text("label").unwrap_or("?").to_string()))
        });
        let list = el(
            "ul",
            Props::new().child(fragment(vec![
                jsx(item.clone(), Props::new().attr("label", "a"), None),
                jsx(item, Props::new().attr("label", "b"), None),
            ])),
        );
        assert_eq!(render_to_string(&list), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn adjacent_text_is_separated() {
        let node = el("p", Props::new().child("a").child("b"));
        assert_eq!(render_to_string(&node), "<p>a<!---->b</p>");

        let plain = render_to_string_with_options(&node, &RenderOptions::new().hydratable(false));
        assert_eq!(plain, "<p>ab</p>");
    }

    #[test]
    fn dynamic_regions_are_marked() {
        let count = Signal::new(3);
        let c = count.clone();
        let node = el(
            "span",
            Props::new()
                .attr("title", dynamic_attr(move || format!("n={}", c.get())))
                .child("Count: ")
                .child(dynamic({
                    let count = count.clone();
                    move || count.get()
                })),
        );
        assert_eq!(
            render_to_string(&node),
            "<span title=\"n=3\">Count: <!--$-->3<!--/$--></span>"
        );
        assert_eq!(count.subscriber_count(), 0);
    }

    #[test]
    fn unrenderable_children_render_empty() {
        let node = el(
            "div",
            Props::new().child(false).child(None::<VNode>).child(Vec::<VNode>::new()),
        );
        assert_eq!(render_to_string(&node), "<div></div>");
        assert_eq!(render_child_to_string(&Child::Empty), "");
    }

    #[test]
    fn repeated_renders_do_not_leak_effects() {
        let source = Signal::new(0);
        let cleanups = Arc::new(AtomicUsize::new(0));
        let widget = {
            let source = source.clone();
            let cleanups = cleanups.clone();
            component(move |_: &Props| {
                let source = source.clone();
                let cleanups = cleanups.clone();
                effect(move || {
                    let _ = source.get();
                    let cleanups = cleanups.clone();
                    on_cleanup(move || {
                        cleanups.fetch_add(1, Ordering::SeqCst);
                    });
                });
                "w"
            })
        };

        let nodes_before = Runtime::node_count();
        for _ in 0..10 {
            render_to_string(&jsx(widget.clone(), Props::new(), None));
        }
        assert_eq!(cleanups.load(Ordering::SeqCst), 10);
        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(Runtime::node_count(), nodes_before);
    }

    #[test]
    fn script_and_style_text_cannot_close_the_tag() {
        let style = el("style", Props::new().child("</style><script>alert(1)</script>"));
        assert_eq!(
            render_to_string(&style),
            "<style>&lt;/style&gt;&lt;script&gt;alert(1)&lt;/script&gt;</style>"
        );

        let script = el("script", Props::new().child("</script><img src=x onerror=alert(1)>"));
        let html = render_to_string(&script);
        assert!(!html.contains("</script><img"));
        assert_eq!(html.matches("</script>").count(), 1);
    }

    #[test]
    fn script_source_goes_through_inner_html() {
        let node = el("script", Props::new().attr("innerHTML", "if (a < b) {}"));
        assert_eq!(render_to_string(&node), "<script>if (a < b) {}</script>");
    }
}
