//! Foreground command endpoints
//!
//! POST /sessions/:sessionId/commands       - Execute one command
//! POST /sessions/:sessionId/commands/batch - Execute commands sequentially

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use hostbridge_core::{BatchCommandRequest, CommandOutput, CommandRequest};
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiResult;
use super::TerminalState;

/// Execute a command and wait for it to finish.
async fn execute_command(
    State(state): State<TerminalState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<Json<CommandOutput>> {
    let output = state.executor.execute(session_id, &request).await?;
    Ok(Json(output))
}

/// Execute a list of commands sequentially.
async fn execute_batch(
    State(state): State<TerminalState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<BatchCommandRequest>,
) -> ApiResult<Json<Value>> {
    let results = state.executor.execute_batch(session_id, &request).await?;
    Ok(Json(json!({
        "results": results,
        "count": results.len(),
    })))
}

/// Create command routes.
pub fn commands_routes(state: TerminalState) -> Router {
    Router::new()
        .route("/sessions/:sessionId/commands", post(execute_command))
        .route("/sessions/:sessionId/commands/batch", post(execute_batch))
        .with_state(state)
}
