//! Sessions
//!
//! A session is a small JSON document tied to a client by a cookie. Two
//! backends are supported:
//!
//! - Cookie: the whole [`SessionData`] travels in the cookie, signed and
//!   optionally encrypted.
//! - Store: the cookie carries a signed session id and the data lives in a
//!   [`SessionStore`].
//!
//! Handlers reach the session through [`Session::from_context`]. A cookie is
//! only written when the session changed during the request.

mod middleware;
mod store;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use middleware::{RequireSession, SessionMiddleware};
pub use store::{MemoryStore, SessionStore};

use crate::context::EdgeContext;
use crate::error::Result;
use crate::signing::random_token;

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// What is persisted for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub values: IndexMap<String, Value>,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds of the last rotation, or creation.
    pub rotated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

impl SessionData {
    pub fn new(now: u64) -> Self {
        Self {
            values: IndexMap::new(),
            created_at: now,
            rotated_at: now,
            csrf_token: None,
        }
    }
}

#[derive(Debug)]
struct SessionState {
    id: Option<String>,
    data: SessionData,
    changed: bool,
    destroyed: bool,
    regenerated: bool,
}

/// Handle to the current request's session. Clones share state.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub(crate) fn new(id: Option<String>, data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                id,
                data,
                changed: false,
                destroyed: false,
                regenerated: false,
            })),
        }
    }

    /// The session attached by [`SessionMiddleware`], if it ran.
    pub fn from_context(ctx: &EdgeContext) -> Option<Session> {
        ctx.get::<Session>().cloned()
    }

    /// The store id. Always `None` for cookie sessions and for sessions
    /// not yet saved.
    pub fn id(&self) -> Option<String> {
        self.inner.lock().id.clone()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.inner.lock().data.values.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.inner.lock().data.values.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().data.values.contains_key(key)
    }

    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut state = self.inner.lock();
        state.data.values.insert(key.into(), value);
        state.changed = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.inner.lock();
        let removed = state.data.values.shift_remove(key);
        if removed.is_some() {
            state.changed = true;
        }
        removed
    }

    /// Drop every value, keeping the session itself.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        if !state.data.values.is_empty() {
            state.data.values.clear();
            state.changed = true;
        }
    }

    /// End the session. Its cookie is removed and stored data deleted.
    pub fn destroy(&self) {
        self.inner.lock().destroyed = true;
    }

    /// Issue the same data under a fresh identity, e.g. after login.
    pub fn regenerate(&self) {
        let mut state = self.inner.lock();
        state.regenerated = true;
        state.changed = true;
        state.data.rotated_at = unix_now();
    }

    /// The session's CSRF token, created on first use.
    pub fn csrf_token(&self) -> String {
        let mut state = self.inner.lock();
        if let Some(token) = &state.data.csrf_token {
            return token.clone();
        }
        let token = random_token(32);
        state.data.csrf_token = Some(token.clone());
        state.changed = true;
        token
    }

    pub(crate) fn existing_csrf_token(&self) -> Option<String> {
        self.inner.lock().data.csrf_token.clone()
    }

    pub fn is_changed(&self) -> bool {
        self.inner.lock().changed
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    pub fn data(&self) -> SessionData {
        self.inner.lock().data.clone()
    }

    fn snapshot(&self) -> (Option<String>, SessionData, bool, bool, bool) {
        let state = self.inner.lock();
        (
            state.id.clone(),
            state.data.clone(),
            state.changed,
            state.destroyed,
            state.regenerated,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_round_trip_through_json() {
        let session = Session::new(None, SessionData::new(10));
        assert!(!session.is_changed());

        session.insert("user", &42u32).unwrap();
        session.insert("roles", &vec!["admin"]).unwrap();
        assert!(session.is_changed());
        assert_eq!(session.get::<u32>("user"), Some(42));
        assert_eq!(session.get::<Vec<String>>("roles"), Some(vec!["admin".to_string()]));
        assert_eq!(session.get::<String>("user"), None);
    }

    #[test]
    fn removing_missing_keys_is_not_a_change() {
        let session = Session::new(None, SessionData::new(10));
        assert_eq!(session.remove("nothing"), None);
        session.clear();
        assert!(!session.is_changed());
    }

    #[test]
    fn csrf_token_is_stable() {
        let session = Session::new(None, SessionData::new(10));
        assert_eq!(session.existing_csrf_token(), None);
        let token = session.csrf_token();
        assert_eq!(session.csrf_token(), token);
        assert!(session.is_changed());
    }

    #[test]
    fn data_serializes_without_empty_token() {
        let json = serde_json::to_string(&SessionData::new(5)).unwrap();
        assert_eq!(json, r#"{"values":{},"created_at":5,"rotated_at":5}"#);
    }
}
