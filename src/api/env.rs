//! Environment variable endpoints
//!
//! GET    /sessions/:sessionId/env       - Snapshot of session variables
//! PUT    /sessions/:sessionId/env       - Merge a batch of variables
//! PUT    /sessions/:sessionId/env/:key  - Set one variable
//! DELETE /sessions/:sessionId/env/:key  - Unset one variable

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use hostbridge_core::SessionRegistry;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiResult;

/// Request body for setting one variable.
#[derive(Debug, Deserialize)]
pub struct EnvVarRequest {
    pub value: String,
}

/// Request body for batch variable updates.
#[derive(Debug, Deserialize)]
pub struct BatchEnvVarsRequest {
    pub variables: HashMap<String, String>,
}

/// Snapshot of the session environment.
async fn get_env_vars(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<HashMap<String, String>>> {
    Ok(Json(registry.env_vars(session_id).await?))
}

/// Set one environment variable.
async fn set_env_var(
    State(registry): State<Arc<SessionRegistry>>,
    Path((session_id, key)): Path<(Uuid, String)>,
    Json(request): Json<EnvVarRequest>,
) -> ApiResult<Json<Value>> {
    registry.set_env(session_id, &key, &request.value).await?;
    Ok(Json(json!({ "message": "Environment variable set" })))
}

/// Unset one environment variable.
async fn unset_env_var(
    State(registry): State<Arc<SessionRegistry>>,
    Path((session_id, key)): Path<(Uuid, String)>,
) -> ApiResult<Json<Value>> {
    registry.unset_env(session_id, &key).await?;
    Ok(Json(json!({ "message": "Environment variable unset" })))
}

/// Merge a batch of environment variables.
async fn set_batch_env_vars(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<BatchEnvVarsRequest>,
) -> ApiResult<Json<Value>> {
    registry.set_env_batch(session_id, request.variables).await?;
    Ok(Json(json!({ "message": "Environment variables set" })))
}

/// Create environment routes.
pub fn env_routes(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route(
            "/sessions/:sessionId/env",
            get(get_env_vars).put(set_batch_env_vars),
        )
        .route(
            "/sessions/:sessionId/env/:key",
            put(set_env_var).delete(unset_env_var),
        )
        .with_state(registry)
}
