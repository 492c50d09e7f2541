use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use content_jobs::{
    app_state::AppState,
    config::AppConfig,
    db::{self, memory::InMemoryDocumentStore, postgres::PgDocumentStore, DocumentStore},
    routes,
    services::{
        auth::TokenService,
        cache::ResponseCache,
        clock::{Clock, SystemClock},
        generative::{ContentGenerator, DisabledGenerator, GeminiClient},
        jobs::JobTracker,
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing content-jobs server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("ai_jobs_enqueued_total", "Total AI jobs enqueued");
    metrics::describe_counter!("ai_jobs_completed_total", "Total AI jobs completed");
    metrics::describe_counter!("ai_jobs_failed_total", "Total AI jobs that failed");
    metrics::describe_histogram!(
        "ai_job_duration_seconds",
        "Time spent in the unit of work of an AI job"
    );
    metrics::describe_counter!("ai_cache_hits_total", "Response cache hits");
    metrics::describe_counter!(
        "ai_cache_misses_total",
        "Response cache misses, including expired entries"
    );
    metrics::describe_counter!(
        "ai_cache_errors_total",
        "Response cache operations that failed and were treated as a miss or no-op"
    );

    // Document store: PostgreSQL when configured, otherwise process memory
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL database");
            let pool = db::init_pool(url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");

            Arc::new(PgDocumentStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory document store");
            Arc::new(InMemoryDocumentStore::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let generator: Arc<dyn ContentGenerator> = match &config.gemini_api_key {
        Some(key) => {
            tracing::info!(model = %config.gemini_model, "Initializing generative language client");
            Arc::new(GeminiClient::new(key.clone(), config.gemini_model.clone()))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, generation jobs will fail");
            Arc::new(DisabledGenerator)
        }
    };

    let tokens = TokenService::new(&config.jwt_secret).expect("Invalid JWT secret");

    let jobs = JobTracker::new(store.clone(), clock.clone(), config.jobs_collection.clone());
    let cache = ResponseCache::new(store.clone(), clock, config.cache_collection.clone())
        .with_default_ttl(Duration::from_secs(config.cache_ttl_secs));

    let state = AppState::new(store, jobs, cache, generator, tokens);

    let app = routes::api_router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
