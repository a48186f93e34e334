//! File endpoints
//!
//! GET    /sessions/:sessionId/files?path=          - List file names
//! GET    /sessions/:sessionId/files-metadata?path= - List with metadata
//! GET    /sessions/:sessionId/file-metadata/*path  - Single file metadata
//! GET    /sessions/:sessionId/files/*path          - Read a file
//! POST   /sessions/:sessionId/files/*path          - Create a file
//! PUT    /sessions/:sessionId/files/*path          - Update a file
//! DELETE /sessions/:sessionId/files/*path          - Delete a file
//! POST   /sessions/:sessionId/extract              - Bulk content extraction
//! POST   /sessions/:sessionId/search               - Content search
//! POST   /sessions/:sessionId/batch-read           - Batch read

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use hostbridge_files::FileMetadata;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::error::ApiResult;
use super::FilesState;

/// Directory selector shared by listing endpoints.
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default = "default_path")]
    pub path: String,
}

pub(crate) fn default_path() -> String {
    ".".to_string()
}

/// Request body carrying file content.
#[derive(Debug, Deserialize)]
pub struct FileRequest {
    #[serde(default)]
    pub content: String,
}

/// Request body naming a set of files.
#[derive(Debug, Deserialize)]
pub struct FileListRequest {
    pub files: Vec<String>,
}

/// Request body for content search.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub pattern: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

/// List file names under a directory.
async fn list_files(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<PathQuery>,
) -> ApiResult<Json<Value>> {
    let files = state.files.list(session_id, &params.path).await?;
    Ok(Json(json!({
        "path": params.path,
        "files": files,
    })))
}

/// List files with metadata under a directory.
async fn list_files_with_metadata(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<PathQuery>,
) -> ApiResult<Json<Value>> {
    let files = state
        .files
        .list_with_metadata(session_id, &params.path)
        .await?;
    Ok(Json(json!({
        "path": params.path,
        "files": files,
    })))
}

/// Metadata for one file.
async fn get_file_metadata(
    State(state): State<FilesState>,
    Path((session_id, path)): Path<(Uuid, String)>,
) -> ApiResult<Json<FileMetadata>> {
    Ok(Json(state.files.metadata(session_id, &path).await?))
}

/// Read a file.
async fn get_file(
    State(state): State<FilesState>,
    Path((session_id, path)): Path<(Uuid, String)>,
) -> ApiResult<Json<Value>> {
    let content = state.files.read(session_id, &path).await?;
    Ok(Json(json!({
        "path": path,
        "content": content,
    })))
}

/// Create a file (parents are created as needed).
async fn create_file(
    State(state): State<FilesState>,
    Path((session_id, path)): Path<(Uuid, String)>,
    Json(request): Json<FileRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.files.create(session_id, &path, &request.content).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "File created successfully",
            "path": path,
        })),
    ))
}

/// Overwrite a file.
async fn update_file(
    State(state): State<FilesState>,
    Path((session_id, path)): Path<(Uuid, String)>,
    Json(request): Json<FileRequest>,
) -> ApiResult<Json<Value>> {
    state.files.update(session_id, &path, &request.content).await?;
    Ok(Json(json!({
        "message": "File updated successfully",
        "path": path,
    })))
}

/// Delete a file.
async fn delete_file(
    State(state): State<FilesState>,
    Path((session_id, path)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    state.files.delete(session_id, &path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bulk content extraction: a flat path-to-content object, with per-file
/// errors inlined.
async fn extract_content(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<FileListRequest>,
) -> Json<Value> {
    let mut result = Map::new();
    for path in &request.files {
        let value = match state.files.read(session_id, path).await {
            Ok(content) => content,
            Err(e) => format!("ERROR: {e}"),
        };
        result.insert(path.clone(), Value::String(value));
    }
    Json(Value::Object(result))
}

/// Substring search over file contents and names.
async fn search_content(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<Value>> {
    let results = state
        .files
        .search(session_id, &request.path, &request.pattern, request.recursive)
        .await?;
    Ok(Json(json!({
        "pattern": request.pattern,
        "path": request.path,
        "recursive": request.recursive,
        "matchedFiles": results.len(),
        "results": results,
    })))
}

/// Batch read with per-entry outcomes.
async fn batch_read_files(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<FileListRequest>,
) -> Json<Value> {
    let results = state.files.batch_read(session_id, &request.files).await;
    Json(json!({ "results": results }))
}

/// Create file routes.
pub fn files_routes(state: FilesState) -> Router {
    Router::new()
        .route("/sessions/:sessionId/files", get(list_files))
        .route(
            "/sessions/:sessionId/files-metadata",
            get(list_files_with_metadata),
        )
        .route(
            "/sessions/:sessionId/file-metadata/*path",
            get(get_file_metadata),
        )
        .route(
            "/sessions/:sessionId/files/*path",
            get(get_file)
                .post(create_file)
                .put(update_file)
                .delete(delete_file),
        )
        .route("/sessions/:sessionId/extract", post(extract_content))
        .route("/sessions/:sessionId/search", post(search_content))
        .route("/sessions/:sessionId/batch-read", post(batch_read_files))
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
    async fn test_file_crud_via_handlers() {
        let (state, id, _dir) = state_with_session().await;

        let (status, _) = create_file(
            State(state.clone()),
            Path((id, "demo.txt".into())),
            Json(FileRequest {
                content: "hello".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let body = get_file(State(state.clone()), Path((id, "demo.txt".into())))
            .await
            .unwrap();
        assert_eq!(body.0["content"], json!("hello"));

        let status = delete_file(State(state.clone()), Path((id, "demo.txt".into())))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        assert!(get_file(State(state), Path((id, "demo.txt".into())))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_extract_inlines_errors() {
        let (state, id, _dir) = state_with_session().await;

        create_file(
            State(state.clone()),
            Path((id, "ok.txt".into())),
            Json(FileRequest {
                content: "fine".into(),
            }),
        )
        .await
        .unwrap();

        let Json(body) = extract_content(
            State(state),
            Path(id),
            Json(FileListRequest {
                files: vec!["ok.txt".into(), "missing.txt".into()],
            }),
        )
        .await;

        assert_eq!(body["ok.txt"], json!("fine"));
        assert!(body["missing.txt"].as_str().unwrap().starts_with("ERROR:"));
    }

    #[tokio::test]
    async fn test_search_shape() {
        let (state, id, _dir) = state_with_session().await;

        create_file(
            State(state.clone()),
            Path((id, "a.txt".into())),
            Json(FileRequest {
                content: "needle here".into(),
            }),
        )
        .await
        .unwrap();

        let body = search_content(
            State(state),
            Path(id),
            Json(SearchRequest {
                pattern: "needle".into(),
                path: ".".into(),
                recursive: true,
            }),
        )
        .await
        .unwrap();

        assert_eq!(body.0["matchedFiles"], json!(1));
        assert_eq!(body.0["pattern"], json!("needle"));
    }
}
