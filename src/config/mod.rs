use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Without it documents live in process memory.
    pub database_url: Option<String>,

    /// Generative Language API key. Without it generation jobs fail.
    pub gemini_api_key: Option<String>,

    /// Model used for content generation
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: String,

    /// Default lifetime of cached AI responses, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Collection holding job records
    #[serde(default = "default_jobs_collection")]
    pub jobs_collection: String,

    /// Collection holding cached responses
    #[serde(default = "default_cache_collection")]
    pub cache_collection: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    30 * 60
}

fn default_jobs_collection() -> String {
    crate::services::jobs::DEFAULT_JOBS_COLLECTION.to_string()
}

fn default_cache_collection() -> String {
    crate::services::cache::DEFAULT_CACHE_COLLECTION.to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
