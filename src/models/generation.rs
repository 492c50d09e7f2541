use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::job::{Job, JobId, JobStatus};

/// Request to generate a piece of social content asynchronously.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[garde(length(min = 1, max = 64))]
    pub job_type: String,

    #[garde(length(min = 1, max = 2000))]
    pub topic: String,

    #[garde(length(min = 1, max = 100))]
    pub tone: Option<String>,

    #[garde(length(min = 1, max = 50))]
    pub platform: Option<String>,

    #[garde(range(min = 10, max = 2000))]
    pub max_words: Option<u32>,
}

impl CreateJobRequest {
    /// Fingerprint inputs, always in this order.
    pub fn cache_params(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("jobType", json!(self.job_type)),
            ("topic", json!(self.topic)),
            ("tone", json!(self.tone)),
            ("platform", json!(self.platform)),
            ("maxWords", json!(self.max_words)),
        ]
    }

    /// The opaque payload stored on the job record.
    pub fn to_payload(&self) -> Value {
        json!({
            "topic": self.topic,
            "tone": self.tone,
            "platform": self.platform,
            "maxWords": self.max_words,
        })
    }
}

/// Response after submitting a generation request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Response for querying job status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub job_type: String,
    pub status: JobStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            job_type: job.job_type,
            status: job.status,
            result: job.result,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobStatusResponse>,
}
