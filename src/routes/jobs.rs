use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::generation::{
    CreateJobRequest, CreateJobResponse, JobListResponse, JobStatusResponse,
};
use crate::models::job::JobStatus;
use crate::routes::auth::AuthUser;
use crate::services::cache::ResponseCache;
use crate::services::generative::{GenerationError, GenerationPrompt};
use crate::services::jobs::JobError;

const LIST_LIMIT: usize = 20;

/// POST /api/v1/jobs — Request AI content; served from cache or queued.
pub async fn create_job(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), StatusCode> {
    request.validate().map_err(|e| {
        tracing::debug!(error = %e, "Rejected job request");
        StatusCode::UNPROCESSABLE_ENTITY
    })?;

    let key = ResponseCache::compute_key(&request.cache_params());
    if let Some(result) = state.cache.get(&key).await {
        return Ok((
            StatusCode::OK,
            Json(CreateJobResponse {
                job_id: None,
                status: JobStatus::Completed,
                cached: true,
                result: Some(result),
            }),
        ));
    }

    let job_id = state
        .jobs
        .enqueue(&user.user_id, &request.job_type, request.to_payload())
        .await
        .map_err(job_error_status)?;

    let generator = state.generator.clone();
    let cache = state.cache.clone();
    let prompt = GenerationPrompt::from(&request);
    state.jobs.spawn_run(job_id, move || async move {
        let content = generator.generate(&prompt).await?;
        match serde_json::to_value(&content) {
            Ok(value) => cache.set(&key, value, None).await,
            Err(e) => tracing::warn!(
                cache_key = %key,
                error = %e,
                "Failed to serialize generated content for caching"
            ),
        }
        Ok::<_, GenerationError>(content)
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            job_id: Some(job_id),
            status: JobStatus::Queued,
            cached: false,
            result: None,
        }),
    ))
}

/// GET /api/v1/jobs/{job_id} — Poll a job owned by the caller.
pub async fn get_job_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    let job = state
        .jobs
        .get(job_id)
        .await
        .map_err(job_error_status)?
        .filter(|job| job.user_id == user.user_id)
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(job.into()))
}

/// GET /api/v1/jobs — The caller's most recent jobs.
pub async fn list_jobs(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<JobListResponse>, StatusCode> {
    let jobs = state
        .jobs
        .list_for_user(&user.user_id, LIST_LIMIT)
        .await
        .map_err(job_error_status)?;

    Ok(Json(JobListResponse {
        jobs: jobs.into_iter().map(Into::into).collect(),
    }))
}

fn job_error_status(error: JobError) -> StatusCode {
    match error {
        JobError::Validation(_) => StatusCode::BAD_REQUEST,
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
        JobError::InvalidTransition { .. } | JobError::Conflict(_) => StatusCode::CONFLICT,
        JobError::StorageUnavailable(e) => {
            tracing::error!(error = %e, "Job store unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
        JobError::Malformed(e) => {
            tracing::error!(error = %e, "Malformed job record");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
