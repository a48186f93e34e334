//! Command history endpoints
//!
//! GET    /sessions/:sessionId/history?limit=N     - Recent entries
//! GET    /sessions/:sessionId/history/search?query=Q - Substring search
//! DELETE /sessions/:sessionId/history             - Clear history

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use hostbridge_core::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiResult;
use super::TerminalState;

/// Query parameters for history listing.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Maximum entries to return; 0 or absent returns everything
    #[serde(default)]
    pub limit: usize,
}

/// Query parameters for history search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Recent history entries for a session.
async fn get_history(
    State(state): State<TerminalState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> Json<Value> {
    let history = state.history.recent(session_id, params.limit).await;
    Json(json!({
        "history": history,
        "count": history.len(),
    }))
}

/// Case-sensitive substring search over a session's history.
async fn search_history(
    State(state): State<TerminalState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    if params.query.is_empty() {
        return Err(Error::InvalidArgument("query parameter is required".into()).into());
    }

    let history = state.history.search(session_id, &params.query).await;
    Ok(Json(json!({
        "history": history,
        "count": history.len(),
        "query": params.query,
    })))
}

/// Clear a session's history.
async fn clear_history(
    State(state): State<TerminalState>,
    Path(session_id): Path<Uuid>,
) -> Json<Value> {
    state.history.clear(session_id).await;
    Json(json!({ "message": "Command history cleared" }))
}

/// Create history routes.
pub fn history_routes(state: TerminalState) -> Router {
    Router::new()
        .route(
            "/sessions/:sessionId/history",
            get(get_history).delete(clear_history),
        )
        .route("/sessions/:sessionId/history/search", get(search_history))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::SessionRegistry;
    use std::sync::Arc;

    fn state() -> TerminalState {
        TerminalState::new(Arc::new(SessionRegistry::new()))
    }

    #[tokio::test]
    async fn test_history_listing_and_clear() {
        let state = state();
        let id = Uuid::new_v4();
        state.history.append(id, "ls").await;
        state.history.append(id, "pwd").await;

        let Json(body) = get_history(
            State(state.clone()),
            Path(id),
            Query(HistoryQuery { limit: 0 }),
        )
        .await;
        assert_eq!(body["count"], json!(2));

        clear_history(State(state.clone()), Path(id)).await;
        let Json(body) = get_history(State(state), Path(id), Query(HistoryQuery::default())).await;
        assert_eq!(body["count"], json!(0));
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let state = state();
        let result = search_history(
            State(state),
            Path(Uuid::new_v4()),
            Query(SearchQuery {
                query: String::new(),
            }),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_search_matches() {
        let state = state();
        let id = Uuid::new_v4();
        state.history.append(id, "git status").await;
        state.history.append(id, "cargo build").await;

        let Json(body) = search_history(
            State(state),
            Path(id),
            Query(SearchQuery {
                query: "git".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body["count"], json!(1));
        assert_eq!(body["query"], json!("git"));
    }
}
