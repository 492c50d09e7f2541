use chrono::TimeDelta;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::db::{to_fields, Direction, DocumentStore, Fields, Precondition, Query, StoreError};
use crate::models::job::{Job, JobId, JobStatus, JobUpdate};
use crate::models::timestamp;
use crate::services::clock::Clock;

pub const DEFAULT_JOBS_COLLECTION: &str = "ai_jobs";

/// Tracks asynchronous AI jobs through `queued -> processing -> completed | failed`.
///
/// Every write is conditioned on the `version` the writer last observed, so two
/// workers racing on the same job cannot silently overwrite each other.
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    collection: String,
}

impl JobTracker {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            collection: collection.into(),
        }
    }

    /// Create a new job in the `queued` state and return its id.
    pub async fn enqueue(
        &self,
        user_id: &str,
        job_type: &str,
        payload: Value,
    ) -> Result<JobId, JobError> {
        require_identifier("userId", user_id)?;
        require_identifier("jobType", job_type)?;

        let job = Job::new(
            user_id.to_string(),
            job_type.to_string(),
            payload,
            self.clock.now(),
        );
        let fields = to_fields(&job).map_err(|e| JobError::Malformed(e.to_string()))?;
        self.store
            .create(&self.collection, &job.id.to_string(), fields)
            .await?;

        metrics::counter!("ai_jobs_enqueued_total", "job_type" => job.job_type.clone()).increment(1);
        tracing::info!(job_id = %job.id, user_id, job_type, "Job enqueued");

        Ok(job.id)
    }

    /// Fetch the current record of a job.
    pub async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobError> {
        let doc = self
            .store
            .get(&self.collection, &job_id.to_string())
            .await?;

        doc.map(|d| d.into_record::<Job>())
            .transpose()
            .map_err(|e| JobError::Malformed(e.to_string()))
    }

    /// Most recent jobs owned by `user_id`, newest first.
    pub async fn list_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Job>, JobError> {
        require_identifier("userId", user_id)?;

        let query = Query::new()
            .filter_eq("userId", user_id)
            .order_by("createdAt", Direction::Descending)
            .limit(limit);

        self.store
            .query(&self.collection, &query)
            .await?
            .into_iter()
            .map(|d| d.into_record::<Job>().map_err(|e| JobError::Malformed(e.to_string())))
            .collect()
    }

    /// Apply a lifecycle transition to a job.
    ///
    /// Only legal edges are accepted. Repeating the job's current state with
    /// identical data is a no-op and performs no write.
    pub async fn update_status(&self, job_id: JobId, update: JobUpdate) -> Result<Job, JobError> {
        let job = self.get(job_id).await?.ok_or(JobError::NotFound(job_id))?;
        if update.is_noop_for(&job) {
            return Ok(job);
        }
        self.apply(&job, update).await
    }

    /// Execute `work` on behalf of a queued job, recording its outcome.
    ///
    /// The three writes (processing, then completed or failed) are issued in
    /// sequence. A failing unit of work is recorded on the job and is not
    /// returned as an error; only store and lifecycle errors are.
    pub async fn run<F, Fut, T, E>(&self, job_id: JobId, work: F) -> Result<JobStatus, JobError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: Display,
    {
        let job = self.get(job_id).await?.ok_or(JobError::NotFound(job_id))?;
        // A job already claimed by another worker must not run twice.
        if job.status != JobStatus::Queued {
            return Err(JobError::InvalidTransition {
                from: job.status,
                to: JobStatus::Processing,
            });
        }

        let job = self.apply(&job, JobUpdate::Processing).await?;
        tracing::info!(job_id = %job_id, job_type = %job.job_type, "Processing job");

        let start = Instant::now();
        let outcome = match work().await {
            Ok(value) => match serde_json::to_value(value) {
                Ok(result) => JobUpdate::Completed(result),
                Err(e) => JobUpdate::Failed(format!("Failed to serialize job result: {}", e)),
            },
            Err(e) => JobUpdate::Failed(e.to_string()),
        };
        let elapsed = start.elapsed();

        let job = self.apply(&job, outcome).await?;

        metrics::histogram!("ai_job_duration_seconds", "job_type" => job.job_type.clone())
            .record(elapsed.as_secs_f64());
        match job.status {
            JobStatus::Completed => {
                metrics::counter!("ai_jobs_completed_total", "job_type" => job.job_type.clone())
                    .increment(1);
                tracing::info!(
                    job_id = %job_id,
                    duration_ms = elapsed.as_millis(),
                    "Job completed successfully"
                );
            }
            _ => {
                metrics::counter!("ai_jobs_failed_total", "job_type" => job.job_type.clone())
                    .increment(1);
                tracing::warn!(
                    job_id = %job_id,
                    duration_ms = elapsed.as_millis(),
                    error = job.error.as_deref().unwrap_or_default(),
                    "Job failed"
                );
            }
        }

        Ok(job.status)
    }

    /// Fire-and-forget `run` on the tokio runtime.
    pub fn spawn_run<F, Fut, T, E>(&self, job_id: JobId, work: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
    {
        let tracker = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tracker.run(job_id, work).await {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record job outcome");
            }
        })
    }

    /// Write `update` on top of the `job` snapshot, conditioned on its version.
    async fn apply(&self, job: &Job, update: JobUpdate) -> Result<Job, JobError> {
        let next = update.status();
        if !job.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: job.status,
                to: next,
            });
        }

        let mut updated = job.clone();
        updated.status = next;
        // Each write strictly advances updatedAt, even on a stalled clock.
        updated.updated_at = self
            .clock
            .now()
            .max(job.updated_at + TimeDelta::nanoseconds(1));
        updated.version = job.version + 1;

        let mut fields = Fields::new();
        fields.insert("status".to_string(), json!(next));
        match update {
            JobUpdate::Processing => {}
            JobUpdate::Completed(result) => {
                fields.insert("result".to_string(), result.clone());
                updated.result = Some(result);
            }
            JobUpdate::Failed(error) => {
                fields.insert("error".to_string(), json!(error));
                updated.error = Some(error);
            }
        }
        fields.insert(
            "updatedAt".to_string(),
            json!(timestamp::format(&updated.updated_at)),
        );
        fields.insert("version".to_string(), json!(updated.version));

        let precondition = Precondition::FieldEquals("version".to_string(), json!(job.version));
        match self
            .store
            .merge(&self.collection, &job.id.to_string(), fields, Some(precondition))
            .await
        {
            Ok(()) => Ok(updated),
            Err(StoreError::PreconditionFailed) => Err(JobError::Conflict(job.id)),
            Err(StoreError::NotFound) => Err(JobError::NotFound(job.id)),
            Err(e) => Err(e.into()),
        }
    }
}

fn require_identifier(field: &'static str, value: &str) -> Result<(), JobError> {
    if value.trim().is_empty() {
        return Err(JobError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job store unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job {0} was modified concurrently")]
    Conflict(JobId),

    #[error("Malformed job record: {0}")]
    Malformed(String),
}
