//! Building a [`Document`] from server-rendered HTML.

use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use indexmap::IndexMap;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::{Document, DomId};
use crate::error::{Error, Result};

impl Document {
    /// Parse server-rendered HTML.
    ///
    /// `html` is either a complete document or a fragment that becomes the
    /// content of `<body>`. Only the body is kept. Parsing follows the HTML5
    /// tree-construction rules, the same ones a browser applies to a server
    /// response, so the resulting tree is what hydration would find on the
    /// client.
    pub fn parse_html(html: &str) -> Result<Document> {
        let document = Document::new();
        let start: String = html.trim_start().chars().take(9).collect::<String>().to_ascii_lowercase();
        if start.starts_with("<!doctype") || start.starts_with("<html") {
            document.copy_body(document.body(), html.to_string())?;
        } else {
            document.append_html(document.body(), html)?;
        }
        document.reset_mutations();
        Ok(document)
    }

    /// Parse `html` as body content and append the resulting nodes to
    /// `parent`.
    pub fn append_html(&self, parent: DomId, html: &str) -> Result<()> {
        self.copy_body(
            parent,
            format!("<!DOCTYPE html><html><head></head><body>{html}</body></html>"),
        )
    }

    fn copy_body(&self, parent: DomId, source: String) -> Result<()> {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(source);

        let body = find_element(&dom.document, "body")
            .ok_or_else(|| Error::Parse("document has no body".to_string()))?;
        for child in body.children.borrow().iter() {
            copy_node(self, parent, child)?;
        }
        Ok(())
    }
}

fn find_element(handle: &Handle, name: &str) -> Option<Handle> {
    if let NodeData::Element { name: qual, .. } = &handle.data {
        if &*qual.local == name {
            return Some(handle.clone());
        }
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, name))
}

fn copy_node(document: &Document, parent: DomId, handle: &Handle) -> Result<()> {
    let id = match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            let attrs: IndexMap<String, String> = attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();
            let id = document.push_parsed_element(&name.local, attrs);
            for child in handle.children.borrow().iter() {
                copy_node(document, id, child)?;
            }
            id
        }
        NodeData::Text { contents } => document.create_text(&contents.borrow()),
        NodeData::Comment { contents } => document.create_comment(contents),
        _ => return Ok(()),
    };
    document.append_child(parent, id)
}
