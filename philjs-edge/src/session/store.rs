//! Server-side session storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::SessionData;
use crate::error::Result;

/// Where store-backed sessions keep their data.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionData>>;

    /// Insert or replace the data for `id`, expiring after `ttl`.
    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()>;

    async fn destroy(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn load(&self, id: &str) -> Result<Option<SessionData>> {
        (**self).load(id).await
    }

    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        (**self).save(id, data, ttl).await
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        (**self).destroy(id).await
    }
}

/// About a century; the cap for lifetimes the clock cannot represent.
const FOREVER_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug)]
struct Entry {
    data: SessionData,
    expires_at: Instant,
}

/// In-process store. Expired entries are dropped when read or purged.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>> {
        let expired = match self.entries.get(id) {
            Some(entry) if entry.expires_at > Instant::now() => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(id);
        }
        Ok(None)
    }

    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        // Far-future lifetimes are capped rather than overflowing the clock.
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(FOREVER_SECS));
        self.entries.insert(
            id.to_string(),
            Entry {
                data: data.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.entries.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .save("a", &SessionData::new(1), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(store.load("a").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.load("a").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired() {
        let store = MemoryStore::new();
        store.save("short", &SessionData::new(1), Duration::from_secs(1)).await.unwrap();
        store.save("long", &SessionData::new(1), Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn huge_ttls_are_capped() {
        let store = MemoryStore::new();
        store
            .save("a", &SessionData::new(1), Duration::MAX)
            .await
            .unwrap();
        assert!(store.load("a").await.unwrap().is_some());
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test]
    async fn destroy_removes_the_entry() {
        let store = Arc::new(MemoryStore::new());
        store.save("a", &SessionData::new(1), Duration::from_secs(60)).await.unwrap();
        store.destroy("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
    }
}
