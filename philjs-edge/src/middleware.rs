//! Middleware and handler traits.
//!
//! A [`Pipeline`] runs its middleware in insertion order. Each middleware
//! receives the request context and a [`Next`] for the rest of the chain; it
//! can act before and after calling it, or answer without calling it at all.
//!
//! ```rust
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use http::{Request, StatusCode};
//! use philjs_edge::middleware::{text_response, Middleware, Next, Pipeline};
//! use philjs_edge::{EdgeContext, Response, Result};
//!
//! struct PoweredBy;
//!
//! #[async_trait]
//! impl Middleware for PoweredBy {
//!     async fn handle(&self, ctx: &mut EdgeContext, next: Next<'_>) -> Result<Response> {
//!         let mut response = next.run(ctx).await?;
//!         response.headers_mut().insert("x-powered-by", "philjs".parse()?);
//!         Ok(response)
//!     }
//! }
//!
//! # tokio_test_block_on(async {
//! let pipeline = Pipeline::new(|_: &mut EdgeContext| -> Result<Response> {
//!     Ok(text_response(StatusCode::OK, "hi"))
//! })
//! .with(PoweredBy);
//! let response = pipeline.handle(Request::new(Bytes::new())).await;
//! assert_eq!(response.headers()["x-powered-by"], "philjs");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE};
use http::{Request, StatusCode};
use philjs_core::ssr::render_to_document;
use philjs_core::view::VNode;
use tracing::{error, warn};

use crate::context::EdgeContext;
use crate::error::Result;

pub type Response = http::Response<Bytes>;

/// The endpoint at the end of a pipeline.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut EdgeContext) -> Result<Response>;
}

#[async_trait]
impl<F> Handler for F
where
    F: Fn(&mut EdgeContext) -> Result<Response> + Send + Sync,
{
    async fn call(&self, ctx: &mut EdgeContext) -> Result<Response> {
        self(ctx)
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut EdgeContext, next: Next<'_>) -> Result<Response>;
}

/// The remainder of the chain after the current middleware.
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub async fn run(self, ctx: &mut EdgeContext) -> Result<Response> {
        match self.middleware.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    middleware: rest,
                    handler: self.handler,
                };
                current.handle(ctx, next).await
            }
            None => self.handler.call(ctx).await,
        }
    }
}

/// Middleware composed in front of a handler.
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
    handler: Arc<dyn Handler>,
}

impl Pipeline {
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self {
            middleware: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn with_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Run a request through the chain.
    ///
    /// Errors become a 500. Cookies queued on the context are appended as
    /// `Set-Cookie` headers whatever the outcome.
    pub async fn handle(&self, request: Request<Bytes>) -> Response {
        let mut ctx = EdgeContext::new(request);
        let next = Next {
            middleware: &self.middleware,
            handler: self.handler.as_ref(),
        };

        let mut response = match next.run(&mut ctx).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, path = ctx.path(), "request failed");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        for cookie in ctx.take_pending_cookies() {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(err) => warn!(error = %err, "dropping unencodable cookie"),
            }
        }
        response
    }
}

pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response {
    with_content_type(status, body.into(), "text/plain; charset=utf-8")
}

pub fn html_response(status: StatusCode, body: impl Into<Bytes>) -> Response {
    with_content_type(status, body.into(), "text/html; charset=utf-8")
}

fn with_content_type(status: StatusCode, body: Bytes, content_type: &'static str) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// A handler that server-renders the page `view` builds for each request.
pub fn ssr_handler<F>(view: F) -> impl Handler
where
    F: Fn(&EdgeContext) -> VNode + Send + Sync + 'static,
{
    move |ctx: &mut EdgeContext| -> Result<Response> {
        let page = render_to_document(&view(&*ctx))?;
        Ok(html_response(StatusCode::OK, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::CookieOptions;
    use crate::error::EdgeError;
    use parking_lot::Mutex;

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Record {
        async fn handle(&self, ctx: &mut EdgeContext, next: Next<'_>) -> Result<Response> {
            self.log.lock().push(format!("{} in", self.name));
            let response = next.run(ctx).await;
            self.log.lock().push(format!("{} out", self.name));
            response
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn handle(&self, _ctx: &mut EdgeContext, _next: Next<'_>) -> Result<Response> {
            Ok(text_response(StatusCode::UNAUTHORIZED, "no"))
        }
    }

    fn ok(_: &mut EdgeContext) -> Result<Response> {
        Ok(text_response(StatusCode::OK, "ok"))
    }

    #[tokio::test]
    async fn middleware_runs_in_order_around_the_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(ok)
            .with(Record { name: "a", log: log.clone() })
            .with(Record { name: "b", log: log.clone() });

        let response = pipeline.handle(Request::new(Bytes::new())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock(), vec!["a in", "b in", "b out", "a out"]);
    }

    #[tokio::test]
    async fn middleware_can_answer_early() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(ok)
            .with(ShortCircuit)
            .with(Record { name: "never", log: log.clone() });

        let response = pipeline.handle(Request::new(Bytes::new())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn errors_become_500_and_cookies_are_committed() {
        let pipeline = Pipeline::new(|ctx: &mut EdgeContext| -> Result<Response> {
            ctx.set_cookie("seen", "1", &CookieOptions::new().path("/"));
            Err(EdgeError::Store("backend down".into()))
        });

        let response = pipeline.handle(Request::new(Bytes::new())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[SET_COOKIE], "seen=1; Path=/");
    }
}
