//! PostgreSQL document store integration tests
//!
//! Note: These require a running PostgreSQL instance configured via the
//! DATABASE_URL environment variable.
//!
//! Run with: cargo test --test integration_test -- --ignored

mod helpers;

use serde_json::json;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;

use content_jobs::db::{
    self, postgres::PgDocumentStore, Direction, DocumentStore, Fields, Precondition, Query,
    StoreError,
};
use content_jobs::models::job::JobStatus;
use content_jobs::services::cache::ResponseCache;
use content_jobs::services::jobs::JobTracker;
use helpers::*;

async fn connect_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::init_pool(&url).await.expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn connect() -> Arc<PgDocumentStore> {
    Arc::new(PgDocumentStore::new(connect_pool().await))
}

/// Collection name unique to one test run.
fn scratch(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_pg_store_contract() {
    let store = connect().await;
    let collection = scratch("contract");

    store.ping().await.expect("Ping failed");

    // 1. Create, and refuse duplicates
    store
        .create(&collection, "a", fields(json!({"userId": "u1", "rank": 2, "version": 0})))
        .await
        .expect("Create failed");
    let err = store
        .create(&collection, "a", fields(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    // 2. Shallow merge keeps unrelated fields
    store
        .merge(&collection, "a", fields(json!({"rank": 3})), None)
        .await
        .expect("Merge failed");
    let doc = store.get(&collection, "a").await.unwrap().expect("Document missing");
    assert_eq!(doc.data["rank"], 3);
    assert_eq!(doc.data["userId"], "u1");

    // 3. Preconditions
    let stale = Precondition::FieldEquals("version".to_string(), json!(7));
    let err = store
        .merge(&collection, "a", fields(json!({"version": 8})), Some(stale.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::PreconditionFailed));
    let err = store
        .merge(&collection, "missing", fields(json!({"version": 8})), Some(stale))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
    store
        .merge(
            &collection,
            "a",
            fields(json!({"version": 1})),
            Some(Precondition::FieldEquals("version".to_string(), json!(0))),
        )
        .await
        .expect("Conditional merge failed");

    // 4. Query with filter, order, limit
    store
        .create(&collection, "b", fields(json!({"userId": "u1", "rank": 9})))
        .await
        .unwrap();
    store
        .create(&collection, "c", fields(json!({"userId": "u2", "rank": 5})))
        .await
        .unwrap();
    let query = Query::new()
        .filter_eq("userId", "u1")
        .order_by("rank", Direction::Descending)
        .limit(1);
    let docs = store.query(&collection, &query).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "b");

    // 5. Delete
    for id in ["a", "b", "c"] {
        store.delete(&collection, id).await.unwrap();
    }
    assert!(store.get(&collection, "a").await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_pg_job_lifecycle_and_cache() {
    let store = connect().await;
    let clock = manual_clock();
    let jobs = JobTracker::new(store.clone(), clock.clone(), scratch("jobs"));
    let cache = ResponseCache::new(store.clone(), clock.clone(), scratch("cache"));

    let id = jobs
        .enqueue("u1", "speech_script", json!({"topic": "launch"}))
        .await
        .expect("Failed to enqueue");
    assert_eq!(jobs.get(id).await.unwrap().unwrap().status, JobStatus::Queued);

    clock.advance(Duration::from_secs(1));
    jobs.run(id, || async { Ok::<_, String>("hello") })
        .await
        .expect("Run failed");

    let job = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result, Some(json!("hello")));
    assert!(job.updated_at > job.created_at);

    let key = ResponseCache::compute_key(&[("topic", json!("launch"))]);
    cache.set(&key, json!({"x": 1}), Some(Duration::from_secs(1))).await;
    assert_eq!(cache.get(&key).await, Some(json!({"x": 1})));
    clock.advance(Duration::from_millis(1100));
    assert_eq!(cache.get(&key).await, None);
}

#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_pg_user_index_matches_query_filter() {
    let pool = connect_pool().await;

    // Query filters compare `data -> field` as JSONB; the index must use the same expression.
    let row = sqlx::query(
        "SELECT indexdef FROM pg_indexes WHERE tablename = 'documents' AND indexname = 'idx_documents_user'",
    )
    .fetch_one(&pool)
    .await
    .expect("idx_documents_user missing");
    let indexdef: String = row.try_get("indexdef").unwrap();
    assert!(indexdef.contains("(data -> 'userId'::text)"), "{}", indexdef);
    assert!(!indexdef.contains("->>"), "{}", indexdef);
}
