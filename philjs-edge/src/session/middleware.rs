use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use tracing::debug;

use super::{unix_now, Session, SessionData, SessionStore};
use crate::config::SessionConfig;
use crate::context::EdgeContext;
use crate::error::Result;
use crate::middleware::{text_response, Middleware, Next, Response};
use crate::signing::{random_token, CookieSigner};

/// Loads the session before the rest of the chain and persists it after.
///
/// A cookie that fails verification, has expired, or points at a missing
/// store entry is treated as absent: the request gets a fresh session and
/// the stale cookie is cleared.
pub struct SessionMiddleware {
    config: SessionConfig,
    signer: CookieSigner,
    store: Option<Arc<dyn SessionStore>>,
}

impl SessionMiddleware {
    /// Sessions stored entirely in the cookie.
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let signer = CookieSigner::new(&config.secret)?;
        Ok(Self {
            config,
            signer,
            store: None,
        })
    }

    /// Sessions stored in `store`, keyed by a signed id cookie.
    pub fn with_store(config: SessionConfig, store: impl SessionStore + 'static) -> Result<Self> {
        let mut middleware = Self::new(config)?;
        middleware.store = Some(Arc::new(store));
        Ok(middleware)
    }

    fn encode(&self, payload: &str) -> Result<String> {
        let signed = self.signer.sign(payload);
        if self.config.encrypt {
            self.signer.encrypt(&signed)
        } else {
            Ok(signed)
        }
    }

    fn decode(&self, cookie: &str) -> Option<String> {
        if self.config.encrypt {
            self.signer.unsign(&self.signer.decrypt(cookie)?)
        } else {
            self.signer.unsign(cookie)
        }
    }

    /// The session for this request, and whether the client holds a cookie
    /// that should be cleared.
    async fn load(&self, ctx: &EdgeContext, now: u64) -> Result<(Session, bool)> {
        let fresh = || Session::new(None, SessionData::new(now));

        let Some(cookie) = ctx.cookie(&self.config.cookie_name) else {
            return Ok((fresh(), false));
        };
        let Some(payload) = self.decode(cookie) else {
            debug!("session cookie failed verification; starting a fresh session");
            return Ok((fresh(), true));
        };

        let (id, data) = match &self.store {
            Some(store) => match store.load(&payload).await? {
                Some(data) => (Some(payload), data),
                None => {
                    debug!("session not found in store; starting a fresh session");
                    return Ok((fresh(), true));
                }
            },
            None => match serde_json::from_str::<SessionData>(&payload) {
                Ok(data) => (None, data),
                Err(err) => {
                    debug!(error = %err, "session payload is malformed; starting a fresh session");
                    return Ok((fresh(), true));
                }
            },
        };

        if now.saturating_sub(data.created_at) >= self.config.max_age {
            debug!(created_at = data.created_at, "session expired");
            if let (Some(store), Some(id)) = (&self.store, &id) {
                store.destroy(id).await?;
            }
            return Ok((fresh(), true));
        }

        let session = Session::new(id, data);
        if let Some(after) = self.config.rotate_after {
            if now.saturating_sub(session.data().rotated_at) >= after {
                debug!("rotating session");
                session.regenerate();
            }
        }
        Ok((session, false))
    }

    async fn commit(&self, ctx: &mut EdgeContext, session: &Session, stale_cookie: bool) -> Result<()> {
        let (id, data, changed, destroyed, regenerated) = session.snapshot();
        let options = self.config.cookie_options();

        if destroyed {
            if let (Some(store), Some(id)) = (&self.store, &id) {
                store.destroy(id).await?;
            }
            if stale_cookie || ctx.cookie(&self.config.cookie_name).is_some() {
                ctx.delete_cookie(&self.config.cookie_name, &options);
            }
            return Ok(());
        }

        if !changed {
            if stale_cookie {
                ctx.delete_cookie(&self.config.cookie_name, &options);
            }
            return Ok(());
        }

        let remaining = self
            .config
            .max_age
            .saturating_sub(unix_now().saturating_sub(data.created_at));
        let payload = match &self.store {
            Some(store) => {
                let id = match id {
                    Some(old) if regenerated => {
                        store.destroy(&old).await?;
                        random_token(32)
                    }
                    Some(id) => id,
                    None => random_token(32),
                };
                store.save(&id, &data, Duration::from_secs(remaining)).await?;
                id
            }
            None => serde_json::to_string(&data)?,
        };

        let value = self.encode(&payload)?;
        let options = crate::cookie::CookieOptions {
            max_age: Some(remaining),
            ..options
        };
        ctx.set_cookie(&self.config.cookie_name, &value, &options);
        Ok(())
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(&self, ctx: &mut EdgeContext, next: Next<'_>) -> Result<Response> {
        let (session, stale_cookie) = self.load(ctx, unix_now()).await?;
        ctx.insert(session.clone());

        let response = next.run(ctx).await?;
        self.commit(ctx, &session, stale_cookie).await?;
        Ok(response)
    }
}

/// Rejects requests whose session lacks `key` with a 401.
///
/// Must run after [`SessionMiddleware`].
pub struct RequireSession {
    key: String,
}

impl RequireSession {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl Middleware for RequireSession {
    async fn handle(&self, ctx: &mut EdgeContext, next: Next<'_>) -> Result<Response> {
        let authorized = Session::from_context(ctx).is_some_and(|session| session.contains(&self.key));
        if !authorized {
            debug!(key = %self.key, path = ctx.path(), "session lacks required key");
            return Ok(text_response(StatusCode::UNAUTHORIZED, "Unauthorized"));
        }
        next.run(ctx).await
    }
}
