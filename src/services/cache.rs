//! Time-bounded memoization of AI responses, keyed by request fingerprint.
//!
//! The cache fails open: a store outage, a malformed entry, or an expired
//! entry all look like a plain miss to the caller, and failed writes are
//! dropped. Failures are still reported to the injected [`CacheObserver`].

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;

use crate::db::{to_fields, DocumentStore, StoreError};
use crate::models::cache::{CacheKey, CachedResponse};
use crate::services::clock::{self, Clock};

pub const DEFAULT_CACHE_COLLECTION: &str = "ai_cache";

/// Entry lifetime when `set` is called without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CacheOp {
    Get,
    Set,
}

/// Sink for cache outcomes that are invisible to callers.
pub trait CacheObserver: Send + Sync {
    fn hit(&self, _key: &CacheKey) {}

    fn miss(&self, _key: &CacheKey) {}

    fn expired(&self, _key: &CacheKey) {}

    fn error(&self, op: CacheOp, key: &CacheKey, error: &StoreError);
}

/// Default observer: structured logs plus Prometheus counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn hit(&self, key: &CacheKey) {
        metrics::counter!("ai_cache_hits_total").increment(1);
        tracing::debug!(cache_key = %key, "Cache hit");
    }

    fn miss(&self, key: &CacheKey) {
        metrics::counter!("ai_cache_misses_total").increment(1);
        tracing::debug!(cache_key = %key, "Cache miss");
    }

    fn expired(&self, key: &CacheKey) {
        metrics::counter!("ai_cache_misses_total").increment(1);
        tracing::debug!(cache_key = %key, "Cache entry expired");
    }

    fn error(&self, op: CacheOp, key: &CacheKey, error: &StoreError) {
        metrics::counter!("ai_cache_errors_total", "op" => op.to_string()).increment(1);
        tracing::warn!(cache_key = %key, op = %op, error = %error, "Cache operation failed");
    }
}

pub struct ResponseCache {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    collection: String,
    default_ttl: Duration,
    observer: Arc<dyn CacheObserver>,
}

impl ResponseCache {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            collection: collection.into(),
            default_ttl: DEFAULT_TTL,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Fingerprint of `params`, serialized in the given order.
    pub fn compute_key(params: &[(&str, Value)]) -> CacheKey {
        CacheKey::from_params(params)
    }

    /// Cached payload for `key`, if present and not yet expired.
    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        let doc = match self.store.get(&self.collection, key.as_str()).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                self.observer.miss(key);
                return None;
            }
            Err(e) => {
                self.observer.error(CacheOp::Get, key, &e);
                return None;
            }
        };

        let entry = match doc.into_record::<CachedResponse>() {
            Ok(entry) => entry,
            Err(e) => {
                self.observer.error(CacheOp::Get, key, &e);
                return None;
            }
        };

        if entry.is_fresh(self.clock.now()) {
            self.observer.hit(key);
            Some(entry.payload)
        } else {
            self.observer.expired(key);
            None
        }
    }

    /// Store `payload` under `key` for `ttl` (default 30 minutes). Best effort.
    pub async fn set(&self, key: &CacheKey, payload: Value, ttl: Option<Duration>) {
        let now = self.clock.now();
        let entry = CachedResponse {
            payload,
            created_at: now,
            expires_at: clock::after(now, ttl.unwrap_or(self.default_ttl)),
        };

        let fields = match to_fields(&entry) {
            Ok(fields) => fields,
            Err(e) => {
                self.observer.error(CacheOp::Set, key, &e);
                return;
            }
        };

        if let Err(e) = self
            .store
            .merge(&self.collection, key.as_str(), fields, None)
            .await
        {
            self.observer.error(CacheOp::Set, key, &e);
        }
    }
}
