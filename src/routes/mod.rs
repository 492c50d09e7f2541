use axum::routing::get;
use axum::Router;

use crate::app_state::AppState;

pub mod auth;
pub mod health;
pub mod jobs;
pub mod metrics;

/// Health and job routes, without the metrics endpoint or middleware layers.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route("/api/v1/jobs/{job_id}", get(jobs::get_job_status))
        .with_state(state)
}
