//! Error types for the edge middleware.

use thiserror::Error;

/// Errors raised inside the middleware pipeline.
///
/// Rejections a client should see (401, 403, 429) are responses, not
/// errors. Anything that reaches the pipeline as an `EdgeError` becomes a
/// 500.
#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("http error: {0}")]
    Http(#[from] http::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    #[error("session store error: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("encryption failed")]
    Encryption,

    #[error("render error: {0}")]
    Render(#[from] philjs_core::Error),
}

pub type Result<T> = std::result::Result<T, EdgeError>;
