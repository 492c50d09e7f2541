use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::generation::CreateJobRequest;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Inputs for one content generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPrompt {
    pub job_type: String,
    pub topic: String,
    pub tone: Option<String>,
    pub platform: Option<String>,
    pub max_words: Option<u32>,
}

impl From<&CreateJobRequest> for GenerationPrompt {
    fn from(request: &CreateJobRequest) -> Self {
        Self {
            job_type: request.job_type.clone(),
            topic: request.topic.clone(),
            tone: request.tone.clone(),
            platform: request.platform.clone(),
            max_words: request.max_words,
        }
    }
}

impl GenerationPrompt {
    /// Instruction text sent to the model.
    pub fn render(&self) -> String {
        let mut prompt = match self.job_type.as_str() {
            "speech_script" => format!("Write a speech script about: {}.", self.topic),
            "caption" => format!("Write a social media caption about: {}.", self.topic),
            "hashtags" => format!(
                "Suggest relevant hashtags for a post about: {}. Return them space-separated.",
                self.topic
            ),
            "thread" => format!(
                "Write a thread of short, numbered posts about: {}.",
                self.topic
            ),
            other => format!("Write {} content about: {}.", other.replace('_', " "), self.topic),
        };

        if let Some(platform) = &self.platform {
            prompt.push_str(&format!(" It will be published on {}.", platform));
        }
        if let Some(tone) = &self.tone {
            prompt.push_str(&format!(" Use a {} tone.", tone));
        }
        if let Some(max_words) = self.max_words {
            prompt.push_str(&format!(" Keep it under {} words.", max_words));
        }
        prompt
    }
}

/// Output of a generation call, stored as the job result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedContent {
    pub text: String,
    pub model: String,
}

/// A generative-language backend.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<GeneratedContent, GenerationError>;
}

/// Client for the Gemini `generateContent` REST API.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<GeneratedContent, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let request_body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![Part {
                    text: prompt.render(),
                }],
            }],
            // Roughly two tokens per word leaves room for formatting.
            generation_config: prompt.max_words.map(|words| GenerationConfig {
                max_output_tokens: words.saturating_mul(2),
            }),
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await
            .map_err(GenerationError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response.json().await.map_err(GenerationError::Http)?;
        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .next()
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .filter(|t| !t.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        tracing::debug!(model = %self.model, chars = text.len(), "Generation complete");

        Ok(GeneratedContent {
            text,
            model: self.model.clone(),
        })
    }
}

/// Generator used when no API key is configured; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

#[async_trait]
impl ContentGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &GenerationPrompt) -> Result<GeneratedContent, GenerationError> {
        Err(GenerationError::NotConfigured)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Content generation is not configured")]
    NotConfigured,
}
