//! Hydration
//!
//! Adopts server-rendered DOM instead of rebuilding it. The walker moves
//! through the container's children in lockstep with the VNode tree:
//!
//! - elements must have the tag the VNode names; listeners and dynamic
//!   attributes are attached, static attributes are left as they are
//! - text nodes are adopted, and corrected in place when the client's text
//!   differs
//! - dynamic children must sit between `$` and `/$` markers; the region's
//!   effect adopts the nodes on its first run and rebuilds them afterwards
//!
//! A mismatch is logged and recorded on the [`Mount`]; the mismatched
//! subtree is left untouched and the walk continues with the next sibling.

use tracing::{debug, warn};

use crate::dom::{Document, DomId, DomNodeKind};
use crate::error::HydrationError;
use crate::reactive::{create_root, untrack};
use crate::render::{bind_props, find_region_end, Errors, Mount, Region, RegionMode};
use crate::ssr::REGION_START;
use crate::view::{is_void_element, Accessor, Child, NodeType, VNode};

/// Hydrate the server-rendered content of `container` with `node`.
///
/// ```rust
/// use philjs_core::dom::Document;
/// use philjs_core::hydrate::hydrate;
/// use philjs_core::ssr::render_to_string;
/// use philjs_core::view::{jsx, Props};
///
/// let node = jsx("h1", Props::new().child("Hello"), None);
/// let document = Document::parse_html(&render_to_string(&node)).unwrap();
///
/// let mount = hydrate(&node, &document, document.body());
/// assert!(mount.is_clean());
/// assert_eq!(document.mutation_count(), 0);
/// ```
pub fn hydrate(node: &VNode, document: &Document, container: DomId) -> Mount {
    let errors = Errors::default();
    let first = document.first_child(container);

    let (next, root) = create_root(|root| {
        let hydrator = Hydrator::new(document, errors.clone());
        let mut cursor = Cursor::new(document, first, None);
        hydrator.node(container, &mut cursor, node, "");
        (cursor.position(), root)
    });

    let mut nodes = Vec::new();
    let mut current = first;
    while let Some(id) = current {
        if Some(id) == next {
            break;
        }
        nodes.push(id);
        current = document.next_sibling(id);
    }

    let mount = Mount::new(root, document.clone(), errors, nodes, false);
    debug!(errors = mount.errors().len(), "hydration complete");
    mount
}

/// Position in a list of siblings, bounded by an optional end node.
struct Cursor<'a> {
    document: &'a Document,
    current: Option<DomId>,
    end: Option<DomId>,
}

impl<'a> Cursor<'a> {
    fn new(document: &'a Document, current: Option<DomId>, end: Option<DomId>) -> Self {
        Self {
            document,
            current,
            end,
        }
    }

    /// The next node to claim, skipping text separators.
    fn peek(&mut self) -> Option<DomId> {
        while let Some(node) = self.current {
            if Some(node) == self.end {
                return None;
            }
            if self.document.comment_text(node).is_some_and(|text| text.is_empty()) {
                self.current = self.document.next_sibling(node);
                continue;
            }
            return Some(node);
        }
        None
    }

    fn advance(&mut self) {
        if let Some(node) = self.peek() {
            self.current = self.document.next_sibling(node);
        }
    }

    fn jump_after(&mut self, node: DomId) {
        self.current = self.document.next_sibling(node);
    }

    fn exhaust(&mut self) {
        self.current = self.end;
    }

    fn position(&mut self) -> Option<DomId> {
        self.peek();
        self.current
    }
}

pub(crate) struct Hydrator<'a> {
    document: &'a Document,
    errors: Errors,
}

impl<'a> Hydrator<'a> {
    pub(crate) fn new(document: &'a Document, errors: Errors) -> Self {
        Self { document, errors }
    }

    /// Adopt the nodes strictly between `start` and `end` for `value`.
    pub(crate) fn hydrate_range(&self, parent: DomId, start: DomId, end: DomId, value: &Child, path: &str) {
        let mut cursor = Cursor::new(self.document, self.document.next_sibling(start), Some(end));
        self.child(parent, &mut cursor, value, path);
        if let Some(extra) = cursor.peek() {
            self.mismatch("end of region", Some(extra), path);
        }
    }

    fn child(&self, parent: DomId, cursor: &mut Cursor<'_>, child: &Child, path: &str) {
        match child {
            Child::Text(text) => self.text(cursor, text, path),
            Child::Node(node) => self.node(parent, cursor, node, path),
            Child::Dynamic(accessor) => self.region(cursor, accessor, path),
            Child::List(items) => {
                for item in items {
                    self.child(parent, cursor, item, path);
                }
            }
            Child::Empty => {}
        }
    }

    fn node(&self, parent: DomId, cursor: &mut Cursor<'_>, node: &VNode, path: &str) {
        match &node.node_type {
            NodeType::Tag(tag) => {
                let path = format!("{path}/{tag}");
                let Some(element) = cursor.peek().filter(|id| self.has_tag(*id, tag)) else {
                    self.mismatch(tag, cursor.peek(), &path);
                    cursor.advance();
                    return;
                };

                bind_props(self.document, element, &node.props, false);
                if !is_void_element(tag) && node.props.get("innerHTML").is_none() {
                    let mut inner = Cursor::new(self.document, self.document.first_child(element), None);
                    for child in node.children() {
                        self.child(element, &mut inner, child, &path);
                    }
                }
                cursor.advance();
            }
            NodeType::Fragment => {
                for child in node.children() {
                    self.child(parent, cursor, child, path);
                }
            }
            NodeType::Component(component) => {
                let output = untrack(|| component.render(&node.props));
                self.child(parent, cursor, &output, path);
            }
        }
    }

    fn text(&self, cursor: &mut Cursor<'_>, text: &str, path: &str) {
        if text.is_empty() {
            return;
        }
        match cursor.peek() {
            Some(node) if self.document.is_text(node) => {
                if self.document.text(node).as_deref() != Some(text) {
                    debug!(path, "correcting server-rendered text");
                    self.document.set_text(node, text);
                }
            }
            found => self.mismatch("#text", found, path),
        }
        cursor.advance();
    }

    fn region(&self, cursor: &mut Cursor<'_>, accessor: &Accessor<Child>, path: &str) {
        let path = format!("{path}/$");
        let start = match cursor.peek() {
            Some(node) if self.document.comment_text(node).as_deref() == Some(REGION_START) => node,
            found => {
                self.mismatch("<!--$-->", found, &path);
                cursor.advance();
                return;
            }
        };
        let Some(end) = find_region_end(self.document, start) else {
            warn!(path = %path, "dynamic region has no closing marker");
            self.errors
                .lock()
                .push(HydrationError::UnterminatedRegion { path });
            cursor.exhaust();
            return;
        };

        Region {
            document: self.document.clone(),
            start,
            end,
            errors: self.errors.clone(),
            path,
        }
        .spawn(accessor.clone(), RegionMode::Hydrate);
        cursor.jump_after(end);
    }

    fn has_tag(&self, node: DomId, tag: &str) -> bool {
        self.document
            .tag(node)
            .is_some_and(|found| found.eq_ignore_ascii_case(tag))
    }

    fn describe(&self, node: Option<DomId>) -> String {
        let Some(node) = node else {
            return "nothing".to_string();
        };
        match self.document.kind(node) {
            Some(DomNodeKind::Element) => self.document.tag(node).unwrap_or_default(),
            Some(DomNodeKind::Text) => "#text".to_string(),
            Some(DomNodeKind::Comment) => {
                format!("<!--{}-->", self.document.comment_text(node).unwrap_or_default())
            }
            None => "nothing".to_string(),
        }
    }

    fn mismatch(&self, expected: &str, found: Option<DomId>, path: &str) {
        let found = self.describe(found);
        warn!(expected, found = %found, path, "hydration mismatch; leaving subtree untouched");
        self.errors.lock().push(HydrationError::Mismatch {
            expected: expected.to_string(),
            found,
            path: path.to_string(),
        });
    }
}
