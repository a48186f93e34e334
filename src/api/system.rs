//! System introspection endpoints
//!
//! GET /system/info   - Host facts
//! GET /system/shells - Installed shells and the session's current shell

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use hostbridge_core::{available_shells, system_info, SessionRegistry, SystemInfo};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Optional session context for shell resolution.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellsQuery {
    pub session_id: Option<Uuid>,
}

/// Host facts.
async fn get_system_info() -> Json<SystemInfo> {
    Json(system_info())
}

/// Installed shells, plus the current shell for the given session (falling
/// back to the server's own `$SHELL`).
async fn get_available_shells(
    State(registry): State<Arc<SessionRegistry>>,
    Query(params): Query<ShellsQuery>,
) -> Json<Value> {
    let shells = available_shells().await;

    let mut current_shell = String::new();
    let mut shell_found_in_session = false;
    if let Some(session_id) = params.session_id {
        if let Ok(env) = registry.env_vars(session_id).await {
            if let Some(shell) = env.get("SHELL").filter(|s| !s.is_empty()) {
                current_shell = shell.clone();
                shell_found_in_session = true;
            }
        }
    }

    let system_shell = std::env::var("SHELL").unwrap_or_default();
    if !shell_found_in_session {
        current_shell = system_shell.clone();
    }

    Json(json!({
        "availableShells": shells,
        "currentShell": current_shell,
        "sessionId": params.session_id,
        "shellFoundInSession": shell_found_in_session,
        "systemShell": system_shell,
    }))
}

/// Create system routes.
pub fn system_routes(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/system/info", get(get_system_info))
        .route("/system/shells", get(get_available_shells))
        .with_state(registry)
}
