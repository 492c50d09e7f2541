use std::sync::Arc;

use crate::db::DocumentStore;
use crate::services::{
    auth::TokenService,
    cache::ResponseCache,
    generative::ContentGenerator,
    jobs::JobTracker,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub jobs: Arc<JobTracker>,
    pub cache: Arc<ResponseCache>,
    pub generator: Arc<dyn ContentGenerator>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        jobs: JobTracker,
        cache: ResponseCache,
        generator: Arc<dyn ContentGenerator>,
        tokens: TokenService,
    ) -> Self {
        Self {
            store,
            jobs: Arc::new(jobs),
            cache: Arc::new(cache),
            generator,
            tokens: Arc::new(tokens),
        }
    }
}
