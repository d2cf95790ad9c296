//! Task endpoints. Each handler resolves the caller's reconciliation
//! session and goes through it, never straight to the store, so the
//! optimistic view stays authoritative.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::routes::AppState;
use super::types::CreateTaskRequest;
use crate::auth::AuthUser;
use crate::engine::ListView;
use crate::error::ApiError;
use crate::model::{Task, TaskPatch};

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ListView>, ApiError> {
    let session = state.sessions.session(user.id).await?;
    Ok(Json(session.view().await))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    if req.task.text.trim().is_empty() {
        return Err(ApiError::Validation("task text must not be empty".to_string()));
    }
    let temp_id = req.temp_id.unwrap_or_else(Uuid::new_v4);
    let session = state.sessions.session(user.id).await?;
    let task = session.create(temp_id, req.task).await?;
    Ok(Json(task))
}

/// PATCH /api/tasks/:id
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state.sessions.session(user.id).await?;
    session.update(id, patch).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state.sessions.session(user.id).await?;
    session.delete(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
