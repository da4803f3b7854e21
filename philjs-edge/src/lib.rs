//! PhilJS Edge
//!
//! Request middleware for serving PhilJS pages from edge runtimes:
//!
//! - A `next()`-chaining [`Pipeline`] over `http` requests and responses
//! - Cookie parsing and `Set-Cookie` serialization
//! - Signed (HMAC-SHA256) and encrypted (AES-256-GCM) cookie values
//! - Sessions stored in the cookie or in a [`SessionStore`]
//! - CSRF protection, session guards and token-bucket rate limiting
//! - An SSR handler that renders a page with `philjs-core`
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use http::{Request, StatusCode};
//! use philjs_core::view::{jsx, Props};
//! use philjs_edge::config::SessionConfig;
//! use philjs_edge::middleware::{ssr_handler, Pipeline};
//! use philjs_edge::session::SessionMiddleware;
//!
//! let pipeline = Pipeline::new(ssr_handler(|ctx| {
//!     jsx("h1", Props::new().child(format!("Hello from {}", ctx.path())), None)
//! }))
//! .with(SessionMiddleware::new(SessionConfig::new("a-secret-of-at-least-32-bytes!!!")).unwrap());
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let response = runtime.block_on(pipeline.handle(
//!     Request::get("/home").body(Bytes::new()).unwrap(),
//! ));
//! assert_eq!(response.status(), StatusCode::OK);
//! ```

pub mod config;
pub mod context;
pub mod cookie;
pub mod csrf;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod session;
pub mod signing;

pub use config::EdgeConfig;
pub use context::EdgeContext;
pub use csrf::{CsrfMiddleware, CsrfToken};
pub use error::{EdgeError, Result};
pub use middleware::{Handler, Middleware, Next, Pipeline, Response};
pub use rate_limit::RateLimiter;
pub use session::{MemoryStore, RequireSession, Session, SessionMiddleware, SessionStore};
pub use signing::CookieSigner;
