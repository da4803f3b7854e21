//! Error types for PhilJS core.

use thiserror::Error;

use crate::dom::DomId;

/// A mismatch between the server-rendered DOM and the VNode tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HydrationError {
    /// The live node is not the element the VNode describes.
    #[error("hydration mismatch at {path}: expected {expected}, found {found}")]
    Mismatch {
        expected: String,
        found: String,
        path: String,
    },

    /// A dynamic region has no closing marker.
    #[error("unterminated dynamic region at {path}")]
    UnterminatedRegion { path: String },
}

/// Errors that can occur in PhilJS core.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Hydration(#[from] HydrationError),

    #[error("invalid hydration state: {0}")]
    State(#[from] serde_json::Error),

    #[error("node not found: {0:?}")]
    NodeNotFound(DomId),

    #[error("invalid tree operation: {0}")]
    Hierarchy(String),

    #[error("failed to parse html: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
