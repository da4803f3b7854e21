//! Client Rendering
//!
//! Materializes a VNode tree into a [`Document`] from scratch. Dynamic
//! children become marker-delimited regions driven by effects, dynamic
//! attributes get their own effects, and handlers become listeners. All of
//! it lives in one reactive root owned by the returned [`Mount`].

mod bind;
mod region;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::dom::{Document, DomId};
use crate::error::{HydrationError, Result};
use crate::reactive::{create_root, untrack, RootHandle};
use crate::ssr::{REGION_END, REGION_START};
use crate::view::{is_void_element, AttrValue, Child, NodeType, VNode};

pub(crate) use bind::bind_props;
pub(crate) use region::{find_region_end, Region, RegionMode};

/// Hydration problems collected while a mount is alive.
pub(crate) type Errors = Arc<Mutex<Vec<HydrationError>>>;

/// A rendered or hydrated tree.
///
/// Dropping the mount leaves it running; call [`dispose`](Mount::dispose)
/// to tear it down.
#[derive(Debug)]
pub struct Mount {
    root: RootHandle,
    document: Document,
    errors: Errors,
    nodes: Vec<DomId>,
    owns_nodes: bool,
}

impl Mount {
    pub(crate) fn new(
        root: RootHandle,
        document: Document,
        errors: Errors,
        nodes: Vec<DomId>,
        owns_nodes: bool,
    ) -> Self {
        Self {
            root,
            document,
            errors,
            nodes,
            owns_nodes,
        }
    }

    /// Mismatches found so far, including ones found by dynamic regions
    /// after the initial pass.
    pub fn errors(&self) -> Vec<HydrationError> {
        self.errors.lock().clone()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Top-level nodes inserted into the container.
    pub fn nodes(&self) -> &[DomId] {
        &self.nodes
    }

    pub fn is_disposed(&self) -> bool {
        self.root.is_disposed()
    }

    /// Tear down every binding. A client render also removes the nodes it
    /// inserted; hydrated DOM is left in place.
    pub fn dispose(&self) {
        if self.root.is_disposed() {
            return;
        }
        self.root.dispose();
        if self.owns_nodes {
            remove_span(&self.document, &self.nodes);
        }
    }
}

/// Remove the contiguous run of siblings from the first to the last of
/// `nodes`, which also covers whatever regions currently hold.
fn remove_span(document: &Document, nodes: &[DomId]) {
    let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) else {
        return;
    };
    let mut current = Some(first);
    while let Some(node) = current {
        current = if node == last {
            None
        } else {
            document.next_sibling(node)
        };
        document.remove(node);
    }
}

/// Render `node` into `container`, appending after existing children.
///
/// ```rust
/// use philjs_core::dom::Document;
/// use philjs_core::reactive::Signal;
/// use philjs_core::render::render;
/// use philjs_core::view::{dynamic, jsx, Props};
///
/// let document = Document::new();
/// let count = Signal::new(1);
/// let c = count.clone();
/// let mount = render(
///     &jsx("p", Props::new().child(dynamic(move || c.get())), None),
///     &document,
///     document.body(),
/// )
/// .unwrap();
///
/// count.set(2);
/// assert_eq!(document.inner_html(document.body()), "<p><!--$-->2<!--/$--></p>");
/// mount.dispose();
/// ```
pub fn render(node: &VNode, document: &Document, container: DomId) -> Result<Mount> {
    let errors = Errors::default();
    let (result, root) = create_root(|root| {
        let builder = Builder::new(document, errors.clone());
        let mut nodes = Vec::new();
        let result = builder
            .insert_node(container, None, node, &mut nodes, "")
            .map(|()| nodes);
        (result, root)
    });

    match result {
        Ok(nodes) => {
            debug!(nodes = nodes.len(), "client render complete");
            Ok(Mount::new(root, document.clone(), errors, nodes, true))
        }
        Err(err) => {
            root.dispose();
            Err(err)
        }
    }
}

/// Builds DOM nodes for VNodes.
pub(crate) struct Builder<'a> {
    document: &'a Document,
    errors: Errors,
}

impl<'a> Builder<'a> {
    pub(crate) fn new(document: &'a Document, errors: Errors) -> Self {
        Self { document, errors }
    }

    /// Insert the nodes for `child` into `parent` before `before`, recording
    /// the top-level nodes created in `out`.
    pub(crate) fn insert_child(
        &self,
        parent: DomId,
        before: Option<DomId>,
        child: &Child,
        out: &mut Vec<DomId>,
        path: &str,
    ) -> Result<()> {
        match child {
            Child::Text(text) => {
                if !text.is_empty() {
                    let id = self.document.create_text(text);
                    self.document.insert_before(parent, id, before)?;
                    out.push(id);
                }
            }
            Child::Node(node) => self.insert_node(parent, before, node, out, path)?,
            Child::Dynamic(accessor) => {
                let start = self.document.create_comment(REGION_START);
                let end = self.document.create_comment(REGION_END);
                self.document.insert_before(parent, start, before)?;
                self.document.insert_before(parent, end, before)?;
                out.push(start);
                out.push(end);
                Region {
                    document: self.document.clone(),
                    start,
                    end,
                    errors: self.errors.clone(),
                    path: format!("{path}/$"),
                }
                .spawn(accessor.clone(), RegionMode::Render);
            }
            Child::List(items) => {
                for item in items {
                    self.insert_child(parent, before, item, out, path)?;
                }
            }
            Child::Empty => {}
        }
        Ok(())
    }

    pub(crate) fn insert_node(
        &self,
        parent: DomId,
        before: Option<DomId>,
        node: &VNode,
        out: &mut Vec<DomId>,
        path: &str,
    ) -> Result<()> {
        match &node.node_type {
            NodeType::Tag(tag) => {
                let element = self.document.create_element(tag);
                let path = format!("{path}/{tag}");
                bind_props(self.document, element, &node.props, true);

                if !is_void_element(tag) {
                    match node.props.get("innerHTML").map(AttrValue::resolve) {
                        Some(AttrValue::Text(html)) => self.document.append_html(element, &html)?,
                        _ => {
                            let mut children = Vec::new();
                            for child in node.children() {
                                self.insert_child(element, None, child, &mut children, &path)?;
                            }
                        }
                    }
                }

                self.document.insert_before(parent, element, before)?;
                out.push(element);
            }
            NodeType::Fragment => {
                for child in node.children() {
                    self.insert_child(parent, before, child, out, path)?;
                }
            }
            NodeType::Component(component) => {
                let output = untrack(|| component.render(&node.props));
                self.insert_child(parent, before, &output, out, path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Event;
    use crate::reactive::{effect, on_cleanup, Signal};
    use crate::view::{component, dynamic, fragment, jsx, Props};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn el(tag: &str, props: Props) -> VNode {
        jsx(tag, props, None)
    }

    #[test]
    fn renders_static_tree() {
        let document = Document::new();
        let node = el(
            "ul",
            Props::new()
                .class("items")
                .child(el("li", Props::new().child("a")))
                .child(el("li", Props::new().child("b").child("c"))),
        );
        let mount = render(&node, &document, document.body()).unwrap();
        assert_eq!(
            document.inner_html(document.body()),
            "<ul class=\"items\"><li>a</li><li>bc</li></ul>"
        );
        assert_eq!(mount.nodes().len(), 1);
        assert!(mount.is_clean());
    }

    #[test]
    fn dynamic_region_rerenders_list() {
        let document = Document::new();
        let items = Signal::new(vec!["a".to_string()]);
        let list = items.clone();
        let node = el(
            "ul",
            Props::new().child(dynamic(move || {
                list.get()
                    .into_iter()
                    .map(|item| el("li", Props::new().child(item)))
                    .collect::<Vec<_>>()
            })),
        );
        let mount = render(&node, &document, document.body()).unwrap();
        assert_eq!(
            document.inner_html(document.body()),
            "<ul><!--$--><li>a</li><!--/$--></ul>"
        );

        items.set(vec!["x".into(), "y".into()]);
        assert_eq!(
            document.inner_html(document.body()),
            "<ul><!--$--><li>x</li><li>y</li><!--/$--></ul>"
        );

        items.set(Vec::new());
        assert_eq!(document.inner_html(document.body()), "<ul><!--$--><!--/$--></ul>");
        mount.dispose();
    }

    #[test]
    fn nested_bindings_are_disposed_on_rerender() {
        let document = Document::new();
        let outer = Signal::new(0);
        let inner = Signal::new(0);
        let disposed = Arc::new(AtomicUsize::new(0));

        let (o, i, d) = (outer.clone(), inner.clone(), disposed.clone());
        let node = el(
            "div",
            Props::new().child(dynamic(move || {
                let _ = o.get();
                let d = d.clone();
                on_cleanup(move || {
                    d.fetch_add(1, Ordering::SeqCst);
                });
                let i = i.clone();
                dynamic(move || i.get())
            })),
        );
        let mount = render(&node, &document, document.body()).unwrap();
        assert_eq!(inner.subscriber_count(), 1);

        outer.set(1);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(inner.subscriber_count(), 1);

        inner.set(5);
        assert_eq!(
            document.inner_html(document.body()),
            "<div><!--$--><!--$-->5<!--/$--><!--/$--></div>"
        );

        mount.dispose();
        assert_eq!(inner.subscriber_count(), 0);
        assert_eq!(outer.subscriber_count(), 0);
    }

    #[test]
    fn dispose_removes_inserted_nodes() {
        let document = Document::new();
        let keep = document.create_element("header");
        document.append_child(document.body(), keep).unwrap();

        let flag = Signal::new(true);
        let f = flag.clone();
        let node = fragment(vec![
            Child::from(el("p", Props::new().child("one"))),
            dynamic(move || f.get().then(|| el("b", Props::new()))),
            Child::from("tail"),
        ]);
        let mount = render(&node, &document, document.body()).unwrap();
        assert_eq!(
            document.inner_html(document.body()),
            "<header></header><p>one</p><!--$--><b></b><!--/$-->tail"
        );

        mount.dispose();
        assert!(mount.is_disposed());
        assert_eq!(document.inner_html(document.body()), "<header></header>");
        flag.set(false);
        assert_eq!(document.inner_html(document.body()), "<header></header>");
    }

    #[test]
    fn handlers_update_state() {
        let document = Document::new();
        let count = Signal::new(0);
        let (c, label) = (count.clone(), count.clone());
        let node = el(
            "button",
            Props::new()
                .on("click", move |_: &Event| c.update(|n| n + 1))
                .child(dynamic(move || label.get())),
        );
        let mount = render(&node, &document, document.body()).unwrap();
        let button = mount.nodes()[0];

        document.dispatch_event(button, Event::new("click"));
        document.dispatch_event(button, Event::new("click"));
        assert_eq!(count.get(), 2);
        assert_eq!(document.text_content(button), "2");
        mount.dispose();
    }

    #[test]
    fn components_render_once() {
        let document = Document::new();
        let source = Signal::new(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let (s, c) = (source.clone(), calls.clone());
        let widget = component(move |_: &Props| {
            c.fetch_add(1, Ordering::SeqCst);
            // Untracked: the component body never re-runs.
            let _ = s.get();
            let s = s.clone();
            el("span", Props::new().child(dynamic(move || s.get())))
        });
        let mount = render(&jsx(widget, Props::new(), None), &document, document.body()).unwrap();
        source.set(2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(document.text_content(document.body()), "2");
        mount.dispose();
    }

    #[test]
    fn inner_html_is_parsed() {
        let document = Document::new();
        let node = el("div", Props::new().attr("innerHTML", "<i>raw</i>"));
        let mount = render(&node, &document, document.body()).unwrap();
        assert_eq!(document.inner_html(document.body()), "<div><i>raw</i></div>");
        mount.dispose();
    }

    #[test]
    fn effects_inside_components_follow_the_mount() {
        let document = Document::new();
        let source = Signal::new(0);
        let runs = Arc::new(AtomicUsize::new(0));
        let (s, r) = (source.clone(), runs.clone());
        let widget = component(move |_: &Props| {
            let (s, r) = (s.clone(), r.clone());
            effect(move || {
                let _ = s.get();
                r.fetch_add(1, Ordering::SeqCst);
            });
            "w"
        });
        let mount = render(&jsx(widget, Props::new(), None), &document, document.body()).unwrap();
        source.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        mount.dispose();
        source.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
