use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::GeminiClient;
use crate::store::CandidateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: GeminiClient,
    pub store: Arc<dyn CandidateStore>,
    pub config: Config,
}
