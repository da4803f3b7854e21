//! Dynamic regions.
//!
//! A region is the run of sibling nodes between a `$` and a `/$` comment.
//! An effect owns the region: whenever the accessor's output changes, the
//! nodes between the markers are removed and the new output is built in
//! their place. Bindings created for the old content belong to the
//! effect's previous run and are disposed with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, trace};

use super::{Builder, Errors};
use crate::dom::{Document, DomId};
use crate::hydrate::Hydrator;
use crate::reactive::{untrack, Effect};
use crate::view::{Accessor, Child};

/// How the first run of a region treats the nodes between its markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegionMode {
    /// The region is empty; build it.
    Render,
    /// The nodes came from the server; adopt them.
    Hydrate,
}

pub(crate) struct Region {
    pub(crate) document: Document,
    pub(crate) start: DomId,
    pub(crate) end: DomId,
    pub(crate) errors: Errors,
    pub(crate) path: String,
}

impl Region {
    /// Start the effect that keeps the region in sync with `accessor`.
    pub(crate) fn spawn(self, accessor: Accessor<Child>, mode: RegionMode) -> Effect {
        let first_run = AtomicBool::new(true);
        let region = Arc::new(self);
        Effect::new(move || {
            let value = accessor.get();
            let hydrating = first_run.swap(false, Ordering::SeqCst) && mode == RegionMode::Hydrate;
            untrack(|| {
                if hydrating {
                    region.hydrate(&value);
                } else {
                    region.rebuild(&value);
                }
            });
        })
    }

    fn hydrate(&self, value: &Child) {
        let Some(parent) = self.document.parent(self.start) else {
            return;
        };
        let hydrator = Hydrator::new(&self.document, self.errors.clone());
        hydrator.hydrate_range(parent, self.start, self.end, value, &self.path);
    }

    fn rebuild(&self, value: &Child) {
        let Some(parent) = self.document.parent(self.start) else {
            return;
        };
        trace!(start = self.start.index(), "re-rendering dynamic region");
        clear_between(&self.document, self.start, self.end);

        let builder = Builder::new(&self.document, self.errors.clone());
        let mut inserted = Vec::new();
        if let Err(err) = builder.insert_child(parent, Some(self.end), value, &mut inserted, &self.path) {
            error!(error = %err, path = %self.path, "failed to render dynamic region");
        }
    }
}

/// Remove every node strictly between `start` and `end`.
pub(crate) fn clear_between(document: &Document, start: DomId, end: DomId) {
    let mut current = document.next_sibling(start);
    while let Some(node) = current {
        if node == end {
            break;
        }
        current = document.next_sibling(node);
        document.remove(node);
    }
}

/// Find the `/$` marker closing the region opened at `start`, skipping
/// nested regions.
pub(crate) fn find_region_end(document: &Document, start: DomId) -> Option<DomId> {
    let mut depth = 0usize;
    let mut current = document.next_sibling(start);
    while let Some(node) = current {
        match document.comment_text(node).as_deref() {
            Some(crate::ssr::REGION_START) => depth += 1,
            Some(crate::ssr::REGION_END) => {
                if depth == 0 {
                    return Some(node);
                }
                depth -= 1;
            }
            _ => {}
        }
        current = document.next_sibling(node);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_end_skips_nested_regions() {
        let document = Document::parse_html("<!--$--><!--$-->a<!--/$-->b<!--/$-->c").unwrap();
        let nodes = document.children(document.body());
        let end = find_region_end(&document, nodes[0]).unwrap();
        assert_eq!(end, nodes[5]);
        assert_eq!(find_region_end(&document, nodes[1]), Some(nodes[3]));
    }

    #[test]
    fn clear_between_keeps_markers() {
        let document = Document::parse_html("<!--$--><b>x</b>y<!--/$-->").unwrap();
        let nodes = document.children(document.body());
        clear_between(&document, nodes[0], nodes[3]);
        assert_eq!(document.inner_html(document.body()), "<!--$--><!--/$-->");
    }
}
