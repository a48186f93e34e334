//! Session-scoped directory operations

use hostbridge_core::{Error, Result, SessionRegistry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// One node in a directory tree listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<DirectoryEntry>>,
}

/// Directory listing, creation, deletion, and tree walks under a session's
/// working directory.
pub struct DirectoryOperations {
    registry: Arc<SessionRegistry>,
}

impl DirectoryOperations {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    async fn resolve(&self, session_id: Uuid, relative: &str) -> Result<PathBuf> {
        let session = self.registry.get(session_id).await?;
        let working_dir = session.require_working_dir().await?;
        Ok(working_dir.join(relative))
    }

    /// Names of the directories directly inside `relative`.
    pub async fn list(&self, session_id: Uuid, relative: &str) -> Result<Vec<String>> {
        let full = self.resolve(session_id, relative).await?;

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&full).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.metadata().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        self.registry
            .log_activity(
                session_id,
                &format!("Listed {} directories in {relative}", names.len()),
            )
            .await;
        Ok(names)
    }

    /// Create a directory and any missing parents, all with mode 0755
    /// regardless of the process umask.
    pub async fn create(&self, session_id: Uuid, relative: &str) -> Result<()> {
        let full = self.resolve(session_id, relative).await?;
        crate::ops::create_dir_all_with_mode(&full).await?;

        self.registry
            .log_activity(session_id, &format!("Created directory {relative}"))
            .await;
        info!(session = %session_id, path = %relative, "created directory");
        Ok(())
    }

    /// Remove a directory and everything under it.
    pub async fn delete(&self, session_id: Uuid, relative: &str) -> Result<()> {
        let full = self.resolve(session_id, relative).await?;
        tokio::fs::remove_dir_all(&full).await?;

        self.registry
            .log_activity(session_id, &format!("Deleted directory {relative}"))
            .await;
        Ok(())
    }

    /// Nested listing down to `max_depth` levels; `max_depth == 0` means
    /// unlimited.
    pub async fn tree(
        &self,
        session_id: Uuid,
        relative: &str,
        max_depth: usize,
    ) -> Result<Vec<DirectoryEntry>> {
        let full = self.resolve(session_id, relative).await?;
        let relative = relative.to_string();

        let entries = tokio::task::spawn_blocking(move || {
            build_tree(&full, Path::new(&relative), 0, max_depth)
        })
        .await
        .map_err(|e| Error::Internal(format!("tree task failed: {e}")))??;

        self.registry
            .log_activity(session_id, "Generated directory tree")
            .await;
        Ok(entries)
    }

    /// Total size in bytes of all files under `relative`.
    pub async fn size(&self, session_id: Uuid, relative: &str) -> Result<u64> {
        let full = self.resolve(session_id, relative).await?;

        let size = tokio::task::spawn_blocking(move || tree_size(&full))
            .await
            .map_err(|e| Error::Internal(format!("size task failed: {e}")))??;

        self.registry
            .log_activity(
                session_id,
                &format!("Calculated size for directory {relative}: {size} bytes"),
            )
            .await;
        Ok(size)
    }

    /// Directories whose name contains `pattern`, as paths relative to the
    /// working directory.
    pub async fn find(
        &self,
        session_id: Uuid,
        base: &str,
        pattern: &str,
        recursive: bool,
    ) -> Result<Vec<String>> {
        let session = self.registry.get(session_id).await?;
        let working_dir = session.require_working_dir().await?;
        let full = working_dir.join(base);
        let needle = pattern.to_string();

        let matches = tokio::task::spawn_blocking(move || {
            let mut matches = Vec::new();
            find_dirs(&full, &working_dir, &needle, recursive, &mut matches);
            matches.sort();
            matches
        })
        .await
        .map_err(|e| Error::Internal(format!("find task failed: {e}")))?;

        self.registry
            .log_activity(
                session_id,
                &format!(
                    "Found {} directories matching '{pattern}' in {base}",
                    matches.len()
                ),
            )
            .await;
        Ok(matches)
    }
}

fn build_tree(
    full: &Path,
    relative: &Path,
    current_depth: usize,
    max_depth: usize,
) -> Result<Vec<DirectoryEntry>> {
    if max_depth > 0 && current_depth >= max_depth {
        return Ok(Vec::new());
    }

    let mut dir_entries: Vec<_> = std::fs::read_dir(full)?.filter_map(|e| e.ok()).collect();
    dir_entries.sort_by_key(|e| e.file_name());

    let mut entries = Vec::with_capacity(dir_entries.len());
    for entry in dir_entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let rel_path = relative.join(&name);

        let mut node = DirectoryEntry {
            name,
            path: rel_path.to_string_lossy().into_owned(),
            size: None,
            is_dir: meta.is_dir(),
            children: None,
        };

        if meta.is_dir() {
            if max_depth == 0 || current_depth + 1 < max_depth {
                let children = build_tree(&entry.path(), &rel_path, current_depth + 1, max_depth)?;
                if !children.is_empty() {
                    node.children = Some(children);
                }
            }
        } else {
            node.size = Some(meta.len());
        }

        entries.push(node);
    }

    Ok(entries)
}

fn tree_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(path)?.filter_map(|e| e.ok()) {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_dir() {
            total += tree_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

fn find_dirs(
    dir: &Path,
    working_dir: &Path,
    pattern: &str,
    recursive: bool,
    matches: &mut Vec<String>,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_dir() {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains(pattern) {
            let rel = path
                .strip_prefix(working_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            matches.push(rel);
        }

        // Non-recursive mode inspects the base's direct children only.
        if recursive {
            find_dirs(&path, working_dir, pattern, recursive, matches);
        }
    }
}

#[cfg(test)]
mod tests;
