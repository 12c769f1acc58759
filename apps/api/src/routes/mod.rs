pub mod candidates;
pub mod health;
pub mod ingest;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/applications/ingest",
            post(ingest::handle_ingest),
        )
        .route("/api/v1/candidates/stats", get(candidates::handle_stats))
        .route(
            "/api/v1/candidates/:id/status",
            patch(candidates::handle_update_status),
        )
        .route("/api/v1/candidates/:id", delete(candidates::handle_delete))
        .with_state(state)
}
