//! Background process endpoints
//!
//! POST /sessions/:sessionId/processes                      - Start a process
//! GET  /sessions/:sessionId/processes                      - List processes
//! GET  /sessions/:sessionId/processes/:processId           - Process snapshot
//! GET  /sessions/:sessionId/processes/:processId/output    - Buffered output
//! POST /sessions/:sessionId/processes/:processId/input     - Write to stdin
//! POST /sessions/:sessionId/processes/:processId/signal    - Send a signal

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use hostbridge_core::{CommandRequest, ProcessInfo};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::error::ApiResult;
use super::TerminalState;

/// Request body for stdin input.
#[derive(Debug, Deserialize)]
pub struct ProcessInputRequest {
    pub input: String,
}

/// Request body for signal delivery (SIGTERM, SIGKILL, SIGINT, SIGHUP).
#[derive(Debug, Deserialize)]
pub struct ProcessSignalRequest {
    pub signal: String,
}

/// Start a background process; returns immediately with its info record.
async fn start_process(
    State(state): State<TerminalState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<(StatusCode, Json<ProcessInfo>)> {
    let info = state.supervisor.start(session_id, &request).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// List the session's processes, keyed by process id.
async fn list_processes(
    State(state): State<TerminalState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let infos = state.supervisor.list(session_id).await?;
    let processes: HashMap<String, &ProcessInfo> =
        infos.iter().map(|p| (p.id.to_string(), p)).collect();
    Ok(Json(json!({
        "processes": processes,
        "count": infos.len(),
    })))
}

/// Snapshot of one process.
async fn get_process(
    State(state): State<TerminalState>,
    Path((session_id, process_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ProcessInfo>> {
    Ok(Json(state.supervisor.get(session_id, process_id).await?))
}

/// Copy of the process's buffered output.
async fn get_process_output(
    State(state): State<TerminalState>,
    Path((session_id, process_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Value>> {
    let (stdout, stderr) = state.supervisor.output(session_id, process_id).await?;
    Ok(Json(json!({
        "stdout": stdout,
        "stderr": stderr,
    })))
}

/// Write to the process's stdin.
async fn send_process_input(
    State(state): State<TerminalState>,
    Path((session_id, process_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ProcessInputRequest>,
) -> ApiResult<Json<Value>> {
    state
        .supervisor
        .send_input(session_id, process_id, &request.input)
        .await?;
    Ok(Json(json!({ "message": "Input sent to process" })))
}

/// Deliver a signal to the process group.
async fn signal_process(
    State(state): State<TerminalState>,
    Path((session_id, process_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ProcessSignalRequest>,
) -> ApiResult<Json<Value>> {
    state
        .supervisor
        .signal(session_id, process_id, &request.signal)
        .await?;
    Ok(Json(json!({ "message": "Signal sent to process" })))
}

/// Create process routes.
pub fn processes_routes(state: TerminalState) -> Router {
    Router::new()
        .route(
            "/sessions/:sessionId/processes",
            get(list_processes).post(start_process),
        )
        .route(
            "/sessions/:sessionId/processes/:processId",
            get(get_process),
        )
        .route(
            "/sessions/:sessionId/processes/:processId/output",
            get(get_process_output),
        )
        .route(
            "/sessions/:sessionId/processes/:processId/input",
            post(send_process_input),
        )
        .route(
            "/sessions/:sessionId/processes/:processId/signal",
            post(signal_process),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::SessionRegistry;
    use std::sync::Arc;
    use std::time::Duration;

    async fn state_with_session() -> (TerminalState, Uuid, tempfile::TempDir) {
        let registry = Arc::new(SessionRegistry::new());
        let state = TerminalState::new(Arc::clone(&registry));

        let dir = tempfile::tempdir().unwrap();
        let view = registry.create().await;
        registry
            .set_working_dir(view.id, dir.path().to_str().unwrap())
            .await
            .unwrap();

        (state, view.id, dir)
    }

    #[tokio::test]
    async fn test_start_and_fetch_process() {
        let (state, id, _dir) = state_with_session().await;

        let (status, Json(info)) = start_process(
            State(state.clone()),
            Path(id),
            Json(CommandRequest {
                command: "echo bg".into(),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(info.pid > 0);

        // Poll until the reaper records completion.
        for _ in 0..100 {
            let fetched = get_process(State(state.clone()), Path((id, info.id)))
                .await
                .unwrap();
            if !fetched.0.is_running {
                assert_eq!(fetched.0.exit_code, Some(0));
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let output = get_process_output(State(state), Path((id, info.id)))
            .await
            .unwrap();
        assert_eq!(output.0["stdout"], json!(["bg"]));
    }

    #[tokio::test]
    async fn test_signal_unknown_process() {
        let (state, id, _dir) = state_with_session().await;

        let result = signal_process(
            State(state),
            Path((id, Uuid::new_v4())),
            Json(ProcessSignalRequest {
                signal: "SIGTERM".into(),
            }),
        )
        .await;
        assert!(result.is_err());
    }
}
