//! Cross-site request forgery protection.
//!
//! Safe methods pass through and make sure a token exists. Unsafe methods
//! must echo the token in the configured header or in the `_csrf` field of
//! a urlencoded form body.
//!
//! The token lives in the session when [`SessionMiddleware`] ran first.
//! Otherwise a signed double-submit cookie holds it.
//!
//! [`SessionMiddleware`]: crate::session::SessionMiddleware

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::CsrfConfig;
use crate::context::EdgeContext;
use crate::error::Result;
use crate::middleware::{text_response, Middleware, Next, Response};
use crate::session::Session;
use crate::signing::{random_token, CookieSigner};

/// The token for the current request, for embedding in forms and meta
/// tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

impl CsrfToken {
    pub fn from_context(ctx: &EdgeContext) -> Option<String> {
        ctx.get::<CsrfToken>().map(|token| token.0.clone())
    }
}

pub struct CsrfMiddleware {
    config: CsrfConfig,
    signer: CookieSigner,
}

fn is_safe(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

impl CsrfMiddleware {
    pub fn new(config: CsrfConfig) -> Result<Self> {
        config.validate()?;
        let signer = CookieSigner::new(&config.secret)?;
        Ok(Self { config, signer })
    }

    fn cookie_token(&self, ctx: &EdgeContext) -> Option<String> {
        self.signer.unsign(ctx.cookie(&self.config.cookie_name)?)
    }

    fn expected_token(&self, ctx: &EdgeContext) -> Option<String> {
        match Session::from_context(ctx) {
            Some(session) => session.existing_csrf_token(),
            None => self.cookie_token(ctx),
        }
    }

    fn ensure_token(&self, ctx: &mut EdgeContext) -> String {
        if let Some(session) = Session::from_context(ctx) {
            return session.csrf_token();
        }
        if let Some(token) = self.cookie_token(ctx) {
            return token;
        }
        let token = random_token(32);
        let signed = self.signer.sign(&token);
        ctx.set_cookie(&self.config.cookie_name, &signed, &self.config.cookie_options());
        token
    }

    fn submitted_token(&self, ctx: &EdgeContext) -> Option<String> {
        if let Some(token) = ctx.header(&self.config.header_name) {
            return Some(token.to_string());
        }
        let is_form = ctx
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return None;
        }
        form_field(ctx.body(), &self.config.field_name)
    }
}

/// Find `name` in a urlencoded body.
fn form_field(body: &[u8], name: &str) -> Option<String> {
    let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    fields
        .into_iter()
        .find_map(|(key, value)| (key == name).then_some(value))
}

#[async_trait]
impl Middleware for CsrfMiddleware {
    async fn handle(&self, ctx: &mut EdgeContext, next: Next<'_>) -> Result<Response> {
        if is_safe(ctx.method()) {
            let token = self.ensure_token(ctx);
            ctx.insert(CsrfToken(token));
            return next.run(ctx).await;
        }

        let Some(submitted) = self.submitted_token(ctx) else {
            warn!(method = %ctx.method(), path = ctx.path(), "csrf token missing");
            return Ok(text_response(StatusCode::FORBIDDEN, "CSRF token missing"));
        };
        let valid = self
            .expected_token(ctx)
            .is_some_and(|expected| bool::from(expected.as_bytes().ct_eq(submitted.as_bytes())));
        if !valid {
            warn!(method = %ctx.method(), path = ctx.path(), "csrf token mismatch");
            return Ok(text_response(StatusCode::FORBIDDEN, "CSRF token invalid"));
        }

        ctx.insert(CsrfToken(submitted));
        next.run(ctx).await
    }
}
