//! Review-grid support endpoints over the candidate store.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: i64,
    pub jobs: Vec<String>,
}

/// GET /api/v1/candidates/stats
pub async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let total = state.store.count().await?;
    let jobs = state.store.distinct("Job").await?;
    Ok(Json(StatsResponse { total, jobs }))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: i32,
}

/// PATCH /api/v1/candidates/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Value>, AppError> {
    state.store.update_status(id, update.status).await?;
    Ok(Json(json!({ "updated": true })))
}

/// DELETE /api/v1/candidates/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.store.delete(id).await?;
    Ok(Json(json!({ "deleted": true })))
}
