//! Server-Side Rendering
//!
//! Renders VNode trees to HTML strings. Components run once, untracked, and
//! every render happens inside its own reactive root which is disposed when
//! the render returns.
//!
//! Hydratable output carries two kinds of comment markers:
//!
//! - `<!--$-->` and `<!--/$-->` around every dynamic region, so the client
//!   can find the nodes a reactive accessor produced.
//! - `<!---->` between adjacent text nodes, which the HTML parser would
//!   otherwise merge into one.

mod context;
mod html;
mod state;

use futures_util::stream::{self, Stream};

pub use context::{render_static, render_to_document, render_to_string_with_context, SsrContext};
pub use html::{
    render_child_to_string, render_to_string, render_to_string_with_options, REGION_END,
    REGION_START,
};
pub use state::{HydrationState, STATE_SCRIPT_ID};

use crate::view::VNode;

/// Render to a stream of HTML chunks.
///
/// The whole document is currently produced as a single chunk.
pub fn render_to_stream(node: &VNode) -> impl Stream<Item = String> + Send + 'static {
    let html = render_to_string(node);
    stream::once(async move { html })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{jsx, Props};
    use futures_util::StreamExt;

    #[tokio::test]
    async fn stream_yields_whole_document() {
        let node = jsx("main", Props::new().child("hi"), None);
        let chunks: Vec<String> = render_to_stream(&node).collect().await;
        assert_eq!(chunks, vec!["<main>hi</main>".to_string()]);
    }
}
