//! Rate Limiting Middleware
//!
//! Token bucket per client. Every request takes one token; tokens flow back
//! at a fixed rate up to the bucket's capacity. A client with an empty
//! bucket gets a 429 with `Retry-After`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use http::StatusCode;
use tokio::time::Instant;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::context::EdgeContext;
use crate::error::Result;
use crate::middleware::{text_response, Middleware, Next, Response};

const LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Tracked clients at which a new client triggers a sweep of idle buckets.
const SWEEP_THRESHOLD: usize = 10_000;

type KeyFn = dyn Fn(&EdgeContext) -> String + Send + Sync;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, capacity: f64, rate: f64, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Outcome of taking a token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, Bucket>,
    /// Tracked clients at which the next sweep runs. Doubles past whatever
    /// a sweep leaves behind.
    sweep_at: AtomicUsize,
    key: Arc<KeyFn>,
}

impl RateLimiter {
    /// Limit per client address, falling back to a shared bucket for
    /// requests without one.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            buckets: DashMap::new(),
            sweep_at: AtomicUsize::new(SWEEP_THRESHOLD),
            key: Arc::new(|ctx: &EdgeContext| {
                ctx.client_ip().unwrap_or_else(|| "anonymous".to_string())
            }),
        })
    }

    /// Derive the bucket key from the request some other way, e.g. from an
    /// API key header.
    pub fn with_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&EdgeContext) -> String + Send + Sync + 'static,
    {
        self.key = Arc::new(key);
        self
    }

    /// Take a token from `key`'s bucket.
    pub fn check(&self, key: &str) -> Decision {
        let capacity = f64::from(self.config.capacity);
        let rate = self.config.refill_per_second;
        if self.buckets.len() >= self.sweep_at.load(Ordering::Relaxed)
            && !self.buckets.contains_key(key)
        {
            let purged = self.purge_idle();
            let tracked = self.buckets.len();
            self.sweep_at
                .store(SWEEP_THRESHOLD.max(tracked.saturating_mul(2)), Ordering::Relaxed);
            debug!(purged, tracked, "swept idle rate limit buckets");
        }

        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::full(capacity, now));
        bucket.refill(capacity, rate, now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Decision::Allowed {
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            let wait = (1.0 - bucket.tokens) / rate;
            Decision::Limited {
                retry_after: Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX),
            }
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets that have refilled completely, returning how many went.
    ///
    /// A full bucket behaves exactly like an absent one, so this never changes
    /// a decision.
    pub fn purge_idle(&self) -> usize {
        let capacity = f64::from(self.config.capacity);
        let rate = self.config.refill_per_second;
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            bucket.refill(capacity, rate, now);
            bucket.tokens < capacity
        });
        before.saturating_sub(self.buckets.len())
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.config
            .exclude_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

#[async_trait]
impl Middleware for RateLimiter {
    async fn handle(&self, ctx: &mut EdgeContext, next: Next<'_>) -> Result<Response> {
        if self.is_excluded(ctx.path()) {
            return next.run(ctx).await;
        }

        let key = (self.key)(&*ctx);
        let limit = HeaderValue::from(self.config.capacity);
        match self.check(&key) {
            Decision::Allowed { remaining } => {
                let mut response = next.run(ctx).await?;
                let headers = response.headers_mut();
                headers.insert(LIMIT, limit);
                headers.insert(REMAINING, HeaderValue::from(remaining));
                Ok(response)
            }
            Decision::Limited { retry_after } => {
                let seconds = retry_after.as_secs_f64().ceil().max(1.0) as u64;
                debug!(key = %key, retry_after = seconds, "rate limit exceeded");

                let mut response = text_response(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests");
                let headers = response.headers_mut();
                headers.insert(RETRY_AFTER, HeaderValue::from(seconds));
                headers.insert(LIMIT, limit);
                headers.insert(REMAINING, HeaderValue::from_static("0"));
                Ok(response)
            }
        }
    }
}
