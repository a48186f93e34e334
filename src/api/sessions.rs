//! Session API endpoints (shared by both services)
//!
//! POST   /sessions              - Create a new session
//! GET    /sessions              - List all sessions
//! GET    /sessions/:sessionId   - Get session details (slides expiry)
//! DELETE /sessions/:sessionId   - Delete a session and kill its processes
//! PUT    /sessions/:sessionId/cwd - Set the session working directory

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use hostbridge_core::{SessionRegistry, SessionView};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiResult;

/// Request to set the working directory.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetWorkingDirRequest {
    pub working_directory: String,
}

/// Create a new session.
async fn create_session(
    State(registry): State<Arc<SessionRegistry>>,
) -> (StatusCode, Json<SessionView>) {
    let view = registry.create().await;
    (StatusCode::CREATED, Json(view))
}

/// Get session details.
async fn get_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    Ok(Json(registry.view(session_id).await?))
}

/// List all sessions.
async fn list_sessions(State(registry): State<Arc<SessionRegistry>>) -> Json<Value> {
    let sessions = registry.list().await;
    Json(json!({
        "sessions": sessions,
        "count": sessions.len(),
    }))
}

/// Delete a session, terminating every process it owns.
async fn delete_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    registry.delete(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set the session working directory.
async fn set_working_dir(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SetWorkingDirRequest>,
) -> ApiResult<Json<SessionView>> {
    let view = registry
        .set_working_dir(session_id, &request.working_directory)
        .await?;
    Ok(Json(view))
}

/// Create session routes over a shared registry.
pub fn sessions_routes(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/:sessionId",
            get(get_session).delete(delete_session),
        )
        .route("/sessions/:sessionId/cwd", put(set_working_dir))
        .with_state(registry)
}
