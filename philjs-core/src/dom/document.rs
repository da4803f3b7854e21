//! Arena-backed document tree.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use super::event::Event;
use crate::error::{Error, Result};
use crate::view::{is_void_element, EventHandler};

/// Handle to a node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomId(usize);

impl DomId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The kind of a DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomNodeKind {
    Element,
    Text,
    Comment,
}

struct Listener {
    id: ListenerId,
    event: String,
    handler: EventHandler,
}

enum NodeData {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
        listeners: Vec<Listener>,
    },
    Text(String),
    Comment(String),
}

struct DomNode {
    data: NodeData,
    parent: Option<DomId>,
    children: Vec<DomId>,
}

struct Tree {
    nodes: Vec<DomNode>,
    next_listener: u64,
    mutations: usize,
}

impl Tree {
    fn node(&self, id: DomId) -> Option<&DomNode> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: DomId) -> Option<&mut DomNode> {
        self.nodes.get_mut(id.0)
    }

    fn push(&mut self, data: NodeData) -> DomId {
        let id = DomId(self.nodes.len());
        self.nodes.push(DomNode {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn require(&self, id: DomId) -> Result<()> {
        if self.node(id).is_some() {
            Ok(())
        } else {
            Err(Error::NodeNotFound(id))
        }
    }

    fn is_ancestor_or_self(&self, candidate: DomId, node: DomId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    fn detach(&mut self, child: DomId) {
        let parent = self.node_mut(child).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.retain(|c| *c != child);
        }
    }

    fn serialize(&self, id: DomId, out: &mut String, raw_text: bool) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    out.push_str(&html_escape::encode_text(text));
                }
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element { tag, attrs, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&html_escape::encode_double_quoted_attribute(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                let raw = is_raw_text_element(tag);
                for child in &node.children {
                    self.serialize(*child, out, raw);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn collect_text(&self, id: DomId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Comment(_) => {}
            NodeData::Element { .. } => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }
}

fn is_raw_text_element(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style")
}

/// An in-memory document.
///
/// Cloning the handle shares the tree. Nodes are never freed: removed
/// nodes stay addressable, detached, like nodes a script still holds.
#[derive(Clone)]
pub struct Document {
    tree: Arc<Mutex<Tree>>,
    body: DomId,
}

impl Document {
    /// Create a document holding an empty `body` element.
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            next_listener: 0,
            mutations: 0,
        };
        let body = tree.push(NodeData::Element {
            tag: "body".to_string(),
            attrs: IndexMap::new(),
            listeners: Vec::new(),
        });
        Self {
            tree: Arc::new(Mutex::new(tree)),
            body,
        }
    }

    /// The container element for rendering.
    pub fn body(&self) -> DomId {
        self.body
    }

    pub fn create_element(&self, tag: &str) -> DomId {
        self.tree.lock().push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: IndexMap::new(),
            listeners: Vec::new(),
        })
    }

    pub fn create_text(&self, text: &str) -> DomId {
        self.tree.lock().push(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&self, text: &str) -> DomId {
        self.tree.lock().push(NodeData::Comment(text.to_string()))
    }

    /// Append `child` to `parent`, moving it if it is attached elsewhere.
    pub fn append_child(&self, parent: DomId, child: DomId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None`.
    pub fn insert_before(&self, parent: DomId, child: DomId, reference: Option<DomId>) -> Result<()> {
        let mut tree = self.tree.lock();
        tree.require(parent)?;
        tree.require(child)?;
        if let Some(reference) = reference {
            let is_child = tree
                .node(reference)
                .is_some_and(|n| n.parent == Some(parent));
            if !is_child {
                return Err(Error::NodeNotFound(reference));
            }
        }
        if !matches!(tree.node(parent).map(|n| &n.data), Some(NodeData::Element { .. })) {
            return Err(Error::Hierarchy(format!("{parent:?} cannot have children")));
        }
        if tree.is_ancestor_or_self(child, parent) {
            return Err(Error::Hierarchy(format!(
                "{child:?} is an ancestor of {parent:?}"
            )));
        }

        tree.detach(child);
        let position = reference.and_then(|reference| {
            tree.node(parent)
                .and_then(|n| n.children.iter().position(|c| *c == reference))
        });
        if let Some(node) = tree.node_mut(parent) {
            match position {
                Some(index) => node.children.insert(index, child),
                None => node.children.push(child),
            }
        }
        if let Some(node) = tree.node_mut(child) {
            node.parent = Some(parent);
        }
        tree.mutations += 1;
        Ok(())
    }

    /// Detach a node from its parent. Detached nodes are left alone.
    pub fn remove(&self, node: DomId) {
        let mut tree = self.tree.lock();
        if tree.node(node).and_then(|n| n.parent).is_some() {
            tree.detach(node);
            tree.mutations += 1;
        }
    }

    pub fn parent(&self, node: DomId) -> Option<DomId> {
        self.tree.lock().node(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: DomId) -> Vec<DomId> {
        self.tree
            .lock()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn first_child(&self, node: DomId) -> Option<DomId> {
        self.tree
            .lock()
            .node(node)
            .and_then(|n| n.children.first().copied())
    }

    pub fn next_sibling(&self, node: DomId) -> Option<DomId> {
        let tree = self.tree.lock();
        let parent = tree.node(node)?.parent?;
        let siblings = &tree.node(parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    pub fn kind(&self, node: DomId) -> Option<DomNodeKind> {
        self.tree.lock().node(node).map(|n| match n.data {
            NodeData::Element { .. } => DomNodeKind::Element,
            NodeData::Text(_) => DomNodeKind::Text,
            NodeData::Comment(_) => DomNodeKind::Comment,
        })
    }

    /// Tag name of an element, lowercase.
    pub fn tag(&self, node: DomId) -> Option<String> {
        match self.tree.lock().node(node).map(|n| &n.data) {
            Some(NodeData::Element { tag, .. }) => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn is_text(&self, node: DomId) -> bool {
        self.kind(node) == Some(DomNodeKind::Text)
    }

    pub fn is_comment(&self, node: DomId) -> bool {
        self.kind(node) == Some(DomNodeKind::Comment)
    }

    /// Data of a text node.
    pub fn text(&self, node: DomId) -> Option<String> {
        match self.tree.lock().node(node).map(|n| &n.data) {
            Some(NodeData::Text(text)) => Some(text.clone()),
            _ => None,
        }
    }

    /// Data of a comment node.
    pub fn comment_text(&self, node: DomId) -> Option<String> {
        match self.tree.lock().node(node).map(|n| &n.data) {
            Some(NodeData::Comment(text)) => Some(text.clone()),
            _ => None,
        }
    }

    /// Replace the data of a text or comment node.
    pub fn set_text(&self, node: DomId, value: &str) {
        let mut tree = self.tree.lock();
        let changed = match tree.node_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Text(text)) | Some(NodeData::Comment(text)) if text.as_str() != value => {
                *text = value.to_string();
                true
            }
            _ => false,
        };
        if changed {
            tree.mutations += 1;
        }
    }

    /// Concatenated text of a node and its descendants.
    pub fn text_content(&self, node: DomId) -> String {
        let mut out = String::new();
        self.tree.lock().collect_text(node, &mut out);
        out
    }

    pub fn get_attribute(&self, node: DomId, name: &str) -> Option<String> {
        match self.tree.lock().node(node).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs.get(name).cloned(),
            _ => None,
        }
    }

    /// Attributes in document order.
    pub fn attributes(&self, node: DomId) -> Vec<(String, String)> {
        match self.tree.lock().node(node).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Set an attribute. Writing the value it already has is not a mutation.
    pub fn set_attribute(&self, node: DomId, name: &str, value: &str) {
        let mut tree = self.tree.lock();
        let changed = match tree.node_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Element { attrs, .. }) => {
                if attrs.get(name).map(String::as_str) == Some(value) {
                    false
                } else {
                    attrs.insert(name.to_string(), value.to_string());
                    true
                }
            }
            _ => false,
        };
        if changed {
            tree.mutations += 1;
        }
    }

    pub fn remove_attribute(&self, node: DomId, name: &str) {
        let mut tree = self.tree.lock();
        let removed = match tree.node_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs.shift_remove(name).is_some(),
            _ => false,
        };
        if removed {
            tree.mutations += 1;
        }
    }

    /// First element in the tree with the given `id` attribute.
    pub fn get_element_by_id(&self, id: &str) -> Option<DomId> {
        let tree = self.tree.lock();
        tree.nodes.iter().enumerate().find_map(|(index, node)| match &node.data {
            NodeData::Element { attrs, .. }
                if attrs.get("id").map(String::as_str) == Some(id) =>
            {
                Some(DomId(index))
            }
            _ => None,
        })
    }

    pub fn add_event_listener(&self, node: DomId, event: &str, handler: EventHandler) -> ListenerId {
        let mut tree = self.tree.lock();
        tree.next_listener += 1;
        let id = ListenerId(tree.next_listener);
        if let Some(NodeData::Element { listeners, .. }) = tree.node_mut(node).map(|n| &mut n.data) {
            listeners.push(Listener {
                id,
                event: event.to_string(),
                handler,
            });
        }
        id
    }

    pub fn remove_event_listener(&self, node: DomId, listener: ListenerId) {
        if let Some(NodeData::Element { listeners, .. }) =
            self.tree.lock().node_mut(node).map(|n| &mut n.data)
        {
            listeners.retain(|l| l.id != listener);
        }
    }

    /// Number of listeners registered on a node.
    pub fn listener_count(&self, node: DomId) -> usize {
        match self.tree.lock().node(node).map(|n| &n.data) {
            Some(NodeData::Element { listeners, .. }) => listeners.len(),
            _ => 0,
        }
    }

    /// Dispatch `event` at `target` and let it bubble to the ancestors.
    ///
    /// Returns the number of listeners that ran. Listeners are called with
    /// the tree unlocked, so they may mutate the document.
    pub fn dispatch_event(&self, target: DomId, event: Event) -> usize {
        event.set_target(target);
        trace!(target = target.0, event = event.kind(), "dispatching event");

        let mut invoked = 0;
        let mut current = Some(target);
        while let Some(node) = current {
            let handlers: Vec<EventHandler> = {
                let tree = self.tree.lock();
                match tree.node(node).map(|n| &n.data) {
                    Some(NodeData::Element { listeners, .. }) => listeners
                        .iter()
                        .filter(|l| l.event == event.kind())
                        .map(|l| l.handler.clone())
                        .collect(),
                    _ => Vec::new(),
                }
            };

            event.set_current_target(node);
            for handler in handlers {
                handler.call(&event);
                invoked += 1;
            }
            if event.is_propagation_stopped() {
                break;
            }
            current = self.parent(node);
        }
        invoked
    }

    /// Serialized children of a node.
    pub fn inner_html(&self, node: DomId) -> String {
        let tree = self.tree.lock();
        let mut out = String::new();
        let raw = match tree.node(node).map(|n| &n.data) {
            Some(NodeData::Element { tag, .. }) => is_raw_text_element(tag),
            _ => false,
        };
        for child in tree.node(node).map(|n| n.children.as_slice()).unwrap_or(&[]) {
            tree.serialize(*child, &mut out, raw);
        }
        out
    }

    /// Serialized node including itself.
    pub fn outer_html(&self, node: DomId) -> String {
        let mut out = String::new();
        self.tree.lock().serialize(node, &mut out, false);
        out
    }

    /// Number of structural, attribute and text changes made so far.
    pub fn mutation_count(&self) -> usize {
        self.tree.lock().mutations
    }

    pub(super) fn push_parsed_element(&self, tag: &str, attrs: IndexMap<String, String>) -> DomId {
        self.tree.lock().push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs,
            listeners: Vec::new(),
        })
    }

    pub(super) fn reset_mutations(&self) {
        self.tree.lock().mutations = 0;
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.tree.lock().nodes.len())
            .field("mutations", &self.mutation_count())
            .finish()
    }
}
