use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

pub type JobId = Uuid;

/// Lifecycle status of an AI content job.
///
/// `queued -> processing -> {completed | failed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the job lifecycle.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// A tracked unit of asynchronous work, as persisted in the jobs collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub user_id: String,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token, bumped on every write.
    #[serde(default)]
    pub version: u64,
}

impl Job {
    pub fn new(
        user_id: String,
        job_type: String,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            job_type,
            payload,
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

/// A status change requested against an existing job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Processing,
    Completed(serde_json::Value),
    Failed(String),
}

impl JobUpdate {
    pub fn status(&self) -> JobStatus {
        match self {
            JobUpdate::Processing => JobStatus::Processing,
            JobUpdate::Completed(_) => JobStatus::Completed,
            JobUpdate::Failed(_) => JobStatus::Failed,
        }
    }

    /// True when applying this update to `job` would change nothing but timestamps.
    pub fn is_noop_for(&self, job: &Job) -> bool {
        match self {
            JobUpdate::Processing => job.status == JobStatus::Processing,
            JobUpdate::Completed(result) => {
                job.status == JobStatus::Completed && job.result.as_ref() == Some(result)
            }
            JobUpdate::Failed(error) => {
                job.status == JobStatus::Failed && job.error.as_deref() == Some(error.as_str())
            }
        }
    }
}
