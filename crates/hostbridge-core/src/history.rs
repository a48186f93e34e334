//! Per-session command history
//!
//! A bounded append log of executed command strings. Searches are
//! case-sensitive substring matches over the command text.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Default per-session history cap.
const DEFAULT_MAX_ENTRIES: usize = 1000;

/// One executed command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub command: String,
    pub timestamp: DateTime<Utc>,
}

/// In-memory command history, keyed by session id.
pub struct HistoryLog {
    history: RwLock<HashMap<Uuid, VecDeque<HistoryEntry>>>,
    max_entries: usize,
}

impl HistoryLog {
    /// Create a history log. `max_entries == 0` selects the default cap.
    pub fn new(max_entries: usize) -> Self {
        Self {
            history: RwLock::new(HashMap::new()),
            max_entries: if max_entries == 0 {
                DEFAULT_MAX_ENTRIES
            } else {
                max_entries
            },
        }
    }

    /// Append a command, evicting the oldest entry beyond the cap.
    pub async fn append(&self, session_id: Uuid, command: &str) {
        let mut history = self.history.write().await;
        let entries = history.entry(session_id).or_default();
        entries.push_back(HistoryEntry {
            command: command.to_string(),
            timestamp: Utc::now(),
        });
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    /// The most recent `limit` entries in insertion order; `limit == 0`
    /// returns everything.
    pub async fn recent(&self, session_id: Uuid, limit: usize) -> Vec<HistoryEntry> {
        let history = self.history.read().await;
        let Some(entries) = history.get(&session_id) else {
            return Vec::new();
        };

        let skip = if limit == 0 || entries.len() <= limit {
            0
        } else {
            entries.len() - limit
        };
        entries.iter().skip(skip).cloned().collect()
    }

    /// Entries whose command contains `query` (case-sensitive).
    pub async fn search(&self, session_id: Uuid, query: &str) -> Vec<HistoryEntry> {
        let history = self.history.read().await;
        history
            .get(&session_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.command.contains(query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop all entries for a session.
    pub async fn clear(&self, session_id: Uuid) {
        self.history.write().await.remove(&session_id);
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
