//! Diff and patch endpoints
//!
//! POST /sessions/:sessionId/diff  - Generate patches between two contents
//! POST /sessions/:sessionId/patch - Apply patches, optionally writing back

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use hostbridge_files::{DiffRequest, PatchRequest};
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiResult;
use super::FilesState;

/// Generate serialized patches.
async fn generate_diff(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<DiffRequest>,
) -> ApiResult<Json<Value>> {
    let patches = state.diff.generate(session_id, &request).await?;
    Ok(Json(json!({ "patches": patches })))
}

/// Apply patches to the supplied original content.
async fn apply_patch(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<PatchRequest>,
) -> ApiResult<Json<Value>> {
    let result = state.diff.apply(session_id, &request).await?;
    Ok(Json(json!({
        "result": result,
        "path": request.file_path,
    })))
}

/// Create diff routes.
pub fn diff_routes(state: FilesState) -> Router {
    Router::new()
        .route("/sessions/:sessionId/diff", post(generate_diff))
        .route("/sessions/:sessionId/patch", post(apply_patch))
        .with_state(state)
}
