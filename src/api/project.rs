//! Project analysis endpoints
//!
//! GET  /sessions/:sessionId/project                    - Project summary
//! GET  /sessions/:sessionId/project/context?maxFiles=  - Code context
//! GET  /sessions/:sessionId/project/structure?path=&depth= - JSON structure
//! POST /sessions/:sessionId/project/batch-create       - Create many files

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use hostbridge_files::{CodeContext, ProjectSummary};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::error::ApiResult;
use super::files::default_path;
use super::FilesState;

/// Query parameters for context extraction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextQuery {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_max_files() -> usize {
    10
}

/// Query parameters for structure export.
#[derive(Debug, Deserialize)]
pub struct StructureQuery {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_structure_depth")]
    pub depth: usize,
}

fn default_structure_depth() -> usize {
    3
}

/// Request body for batch file creation.
#[derive(Debug, Deserialize)]
pub struct BatchFilesRequest {
    pub files: HashMap<String, String>,
}

/// Summary of the project in the working directory.
async fn get_project_summary(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ProjectSummary>> {
    Ok(Json(state.project.summary(session_id).await?))
}

/// Code-context report for LLM consumption.
async fn extract_code_context(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<ContextQuery>,
) -> ApiResult<Json<CodeContext>> {
    Ok(Json(
        state
            .project
            .code_context(session_id, params.max_files)
            .await?,
    ))
}

/// JSON rendering of the directory structure.
async fn export_file_structure(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<StructureQuery>,
) -> ApiResult<Json<Value>> {
    let structure = state
        .files
        .export_structure(session_id, &params.path, params.depth)
        .await?;
    Ok(Json(json!({
        "path": params.path,
        "depth": params.depth,
        "structure": structure,
    })))
}

/// Create many files in one call, with per-entry outcomes.
async fn batch_create_files(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<BatchFilesRequest>,
) -> Json<Value> {
    let results = state.files.batch_create(session_id, &request.files).await;
    Json(json!({ "results": results }))
}

/// Create project routes.
pub fn project_routes(state: FilesState) -> Router {
    Router::new()
        .route("/sessions/:sessionId/project", get(get_project_summary))
        .route(
            "/sessions/:sessionId/project/context",
            get(extract_code_context),
        )
        .route(
            "/sessions/:sessionId/project/structure",
            get(export_file_structure),
        )
        .route(
            "/sessions/:sessionId/project/batch-create",
            post(batch_create_files),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::SessionRegistry;
    use std::sync::Arc;

    async fn state_with_session() -> (FilesState, Uuid, tempfile::TempDir) {
        let registry = Arc::new(SessionRegistry::new());
        let state = FilesState::new(Arc::clone(&registry));

        let dir = tempfile::tempdir().unwrap();
        let view = registry.create().await;
        registry
            .set_working_dir(view.id, dir.path().to_str().unwrap())
            .await
            .unwrap();

        (state, view.id, dir)
    }

    #[tokio::test]
    async fn test_summary_endpoint() {
        let (state, id, dir) = state_with_session().await;
        std::fs::write(dir.path().join("main.py"), "import os\n").unwrap();

        let summary = get_project_summary(State(state), Path(id)).await.unwrap();
        assert_eq!(summary.0.file_count, 1);
        assert!(summary.0.key_files.contains(&"main.py".to_string()));
    }

    #[tokio::test]
    async fn test_batch_create_endpoint() {
        let (state, id, dir) = state_with_session().await;

        let mut files = HashMap::new();
        files.insert("a.txt".to_string(), "A".to_string());

        let Json(body) = batch_create_files(
            State(state),
            Path(id),
            Json(BatchFilesRequest { files }),
        )
        .await;

        assert!(body["results"][0]["success"].as_bool().unwrap());
        assert!(dir.path().join("a.txt").is_file());
    }
}
