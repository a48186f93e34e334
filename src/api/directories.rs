//! Directory endpoints
//!
//! GET    /sessions/:sessionId/directories?path=       - List directory names
//! POST   /sessions/:sessionId/directories/*path       - Create a directory
//! DELETE /sessions/:sessionId/directories/*path       - Delete recursively
//! GET    /sessions/:sessionId/directory-tree?path=&depth= - Nested tree
//! GET    /sessions/:sessionId/directory-size/*path    - Recursive size

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiResult;
use super::files::default_path;
use super::FilesState;

/// Query parameters for the tree endpoint.
#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_tree_depth")]
    pub depth: usize,
}

fn default_tree_depth() -> usize {
    2
}

/// List directory names under a path.
async fn list_directories(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<super::files::PathQuery>,
) -> ApiResult<Json<Value>> {
    let directories = state.dirs.list(session_id, &params.path).await?;
    Ok(Json(json!({
        "path": params.path,
        "directories": directories,
    })))
}

/// Create a directory (and missing parents).
async fn create_directory(
    State(state): State<FilesState>,
    Path((session_id, path)): Path<(Uuid, String)>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.dirs.create(session_id, &path).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Directory created successfully",
            "path": path,
        })),
    ))
}

/// Delete a directory recursively.
async fn delete_directory(
    State(state): State<FilesState>,
    Path((session_id, path)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    state.dirs.delete(session_id, &path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Nested directory tree down to `depth` levels.
async fn get_directory_tree(
    State(state): State<FilesState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<TreeQuery>,
) -> ApiResult<Json<Value>> {
    let tree = state.dirs.tree(session_id, &params.path, params.depth).await?;
    Ok(Json(json!({
        "path": params.path,
        "tree": tree,
    })))
}

/// Recursive size of a directory in bytes.
async fn get_directory_size(
    State(state): State<FilesState>,
    Path((session_id, path)): Path<(Uuid, String)>,
) -> ApiResult<Json<Value>> {
    let size = state.dirs.size(session_id, &path).await?;
    Ok(Json(json!({
        "path": path,
        "size": size,
        "sizeFormatted": format_size(size),
    })))
}

/// Human-readable byte count.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    match size {
        s if s >= GB => format!("{:.2} GB", s as f64 / GB as f64),
        s if s >= MB => format!("{:.2} MB", s as f64 / MB as f64),
        s if s >= KB => format!("{:.2} KB", s as f64 / KB as f64),
        s => format!("{s} bytes"),
    }
}

/// Create directory routes.
pub fn directories_routes(state: FilesState) -> Router {
    Router::new()
        .route("/sessions/:sessionId/directories", get(list_directories))
        .route(
            "/sessions/:sessionId/directories/*path",
            axum::routing::post(create_directory).delete(delete_directory),
        )
        .route(
            "/sessions/:sessionId/directory-tree",
            get(get_directory_tree),
        )
        .route(
            "/sessions/:sessionId/directory-size/*path",
            get(get_directory_size),
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
    async fn test_directory_lifecycle() {
        let (state, id, _dir) = state_with_session().await;

        let (status, _) = create_directory(State(state.clone()), Path((id, "nested/dir".into())))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let body = list_directories(
            State(state.clone()),
            Path(id),
            Query(super::super::files::PathQuery { path: ".".into() }),
        )
        .await
        .unwrap();
        assert_eq!(body.0["directories"], json!(["nested"]));

        let status = delete_directory(State(state), Path((id, "nested".into())))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_directory_size_formatting() {
        let (state, id, dir) = state_with_session().await;
        std::fs::write(dir.path().join("f.bin"), vec![0u8; 2048]).unwrap();

        let body = get_directory_size(State(state), Path((id, ".".into())))
            .await
            .unwrap();
        assert_eq!(body.0["size"], json!(2048));
        assert_eq!(body.0["sizeFormatted"], json!("2.00 KB"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }
}
