//! Shared fixtures for tracker, cache, and API tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use content_jobs::db::{
    memory::InMemoryDocumentStore, Document, DocumentStore, Fields, Precondition, Query,
    StoreError,
};
use content_jobs::models::cache::CacheKey;
use content_jobs::services::cache::{CacheObserver, CacheOp, ResponseCache};
use content_jobs::services::clock::ManualClock;
use content_jobs::services::generative::{
    ContentGenerator, GeneratedContent, GenerationError, GenerationPrompt,
};
use content_jobs::services::jobs::JobTracker;

pub const JOBS: &str = "ai_jobs";
pub const CACHE: &str = "ai_cache";

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ))
}

/// Tracker and cache over one in-memory store and one manual clock.
pub struct Harness {
    pub store: Arc<InMemoryDocumentStore>,
    pub clock: Arc<ManualClock>,
    pub jobs: JobTracker,
    pub cache: ResponseCache,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let clock = manual_clock();
        let observer = Arc::new(RecordingObserver::default());
        let jobs = JobTracker::new(store.clone(), clock.clone(), JOBS);
        let cache = ResponseCache::new(store.clone(), clock.clone(), CACHE)
            .with_observer(observer.clone());
        Self {
            store,
            clock,
            jobs,
            cache,
            observer,
        }
    }
}

/// Records cache outcomes as short strings ("hit", "miss", "expired", "error:get").
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl CacheObserver for RecordingObserver {
    fn hit(&self, _key: &CacheKey) {
        self.push("hit".to_string());
    }

    fn miss(&self, _key: &CacheKey) {
        self.push("miss".to_string());
    }

    fn expired(&self, _key: &CacheKey) {
        self.push("expired".to_string());
    }

    fn error(&self, op: CacheOp, _key: &CacheKey, _error: &StoreError) {
        self.push(format!("error:{}", op));
    }
}

/// A store whose backend is always down.
pub struct UnavailableStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<Document>, StoreError> {
        Err(down())
    }

    async fn create(&self, _collection: &str, _id: &str, _data: Fields) -> Result<(), StoreError> {
        Err(down())
    }

    async fn merge(
        &self,
        _collection: &str,
        _id: &str,
        _fields: Fields,
        _precondition: Option<Precondition>,
    ) -> Result<(), StoreError> {
        Err(down())
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<(), StoreError> {
        Err(down())
    }

    async fn query(&self, _collection: &str, _query: &Query) -> Result<Vec<Document>, StoreError> {
        Err(down())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(down())
    }
}

/// In-memory store where another writer bumps the version right before the
/// first conditional write lands.
#[derive(Default)]
pub struct RacingStore {
    pub inner: InMemoryDocumentStore,
    raced: AtomicBool,
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn create(&self, collection: &str, id: &str, data: Fields) -> Result<(), StoreError> {
        self.inner.create(collection, id, data).await
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError> {
        if precondition.is_some() && !self.raced.swap(true, Ordering::SeqCst) {
            let mut rival = Fields::new();
            rival.insert("status".to_string(), json!("processing"));
            rival.insert("version".to_string(), json!(1));
            self.inner.merge(collection, id, rival, None).await?;
        }
        self.inner.merge(collection, id, fields, precondition).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.inner.query(collection, query).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

/// Generator returning canned text, or a canned provider error.
pub struct FakeGenerator {
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<GeneratedContent, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(GenerationError::Api {
                status: 429,
                message: message.clone(),
            }),
            None => Ok(GeneratedContent {
                text: format!("Draft about {}", prompt.topic),
                model: "fake-model".to_string(),
            }),
        }
    }
}
