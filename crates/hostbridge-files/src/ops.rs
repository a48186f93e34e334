//! Session-scoped file operations
//!
//! Every path is resolved by joining against the session's working
//! directory; an unset working directory fails the operation. Simple CRUD
//! goes through `tokio::fs`; recursive walks run as blocking tasks.

use chrono::{DateTime, Utc};
use hostbridge_core::{Error, Result, SessionRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Metadata for one directory entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    pub permissions: String,
}

/// Outcome of one entry in a batch operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// File CRUD, metadata, search, and structure export under a session's
/// working directory.
pub struct FileOperations {
    registry: Arc<SessionRegistry>,
}

impl FileOperations {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve a session-relative path against the session working
    /// directory.
    pub async fn resolve(&self, session_id: Uuid, relative: &str) -> Result<PathBuf> {
        let session = self.registry.get(session_id).await?;
        let working_dir = session.require_working_dir().await?;
        Ok(working_dir.join(relative))
    }

    /// Names of the plain files directly inside `relative`.
    pub async fn list(&self, session_id: Uuid, relative: &str) -> Result<Vec<String>> {
        let full = self.resolve(session_id, relative).await?;

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&full).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        self.registry
            .log_activity(
                session_id,
                &format!("Listed {} files in {relative}", names.len()),
            )
            .await;
        Ok(names)
    }

    /// Metadata for the plain files directly inside `relative`.
    pub async fn list_with_metadata(
        &self,
        session_id: Uuid,
        relative: &str,
    ) -> Result<Vec<FileMetadata>> {
        let full = self.resolve(session_id, relative).await?;

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&full).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let rel_path = Path::new(relative).join(&name);
            files.push(build_metadata(&name, &rel_path.to_string_lossy(), &meta));
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        self.registry
            .log_activity(
                session_id,
                &format!("Listed {} files with metadata in {relative}", files.len()),
            )
            .await;
        Ok(files)
    }

    /// Read a file as text (invalid UTF-8 is replaced, not rejected).
    pub async fn read(&self, session_id: Uuid, relative: &str) -> Result<String> {
        let full = self.resolve(session_id, relative).await?;
        let bytes = tokio::fs::read(&full).await?;

        self.registry
            .log_activity(session_id, &format!("Read file {relative}"))
            .await;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Metadata for a single path.
    pub async fn metadata(&self, session_id: Uuid, relative: &str) -> Result<FileMetadata> {
        let full = self.resolve(session_id, relative).await?;
        let meta = tokio::fs::metadata(&full).await?;
        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.registry
            .log_activity(session_id, &format!("Retrieved metadata for {relative}"))
            .await;
        Ok(build_metadata(&name, relative, &meta))
    }

    /// Create (or overwrite) a file. Missing parent directories are created
    /// with mode 0755 and the file is pinned to mode 0644, independent of
    /// the process umask.
    pub async fn create(&self, session_id: Uuid, relative: &str, content: &str) -> Result<()> {
        let full = self.resolve(session_id, relative).await?;
        if let Some(parent) = full.parent() {
            create_dir_all_with_mode(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        set_file_mode(&full).await?;

        self.registry
            .log_activity(session_id, &format!("Created file {relative}"))
            .await;
        info!(session = %session_id, path = %relative, "created file");
        Ok(())
    }

    /// Overwrite an existing file.
    pub async fn update(&self, session_id: Uuid, relative: &str, content: &str) -> Result<()> {
        let full = self.resolve(session_id, relative).await?;
        tokio::fs::write(&full, content).await?;

        self.registry
            .log_activity(session_id, &format!("Updated file {relative}"))
            .await;
        Ok(())
    }

    /// Remove a file.
    pub async fn delete(&self, session_id: Uuid, relative: &str) -> Result<()> {
        let full = self.resolve(session_id, relative).await?;
        tokio::fs::remove_file(&full).await?;

        self.registry
            .log_activity(session_id, &format!("Deleted file {relative}"))
            .await;
        Ok(())
    }

    /// Read many files; each entry reports its own success or failure.
    pub async fn batch_read(&self, session_id: Uuid, paths: &[String]) -> Vec<BatchResult> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let result = match self.read(session_id, path).await {
                Ok(content) => BatchResult {
                    path: path.clone(),
                    success: true,
                    result: Some(content),
                    error: None,
                },
                Err(e) => BatchResult {
                    path: path.clone(),
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);
        }

        self.registry
            .log_activity(session_id, &format!("Batch read {} files", paths.len()))
            .await;
        results
    }

    /// Create many files; each entry reports its own success or failure.
    pub async fn batch_create(
        &self,
        session_id: Uuid,
        files: &HashMap<String, String>,
    ) -> Vec<BatchResult> {
        let mut results = Vec::with_capacity(files.len());
        let mut paths: Vec<&String> = files.keys().collect();
        paths.sort();

        for path in paths {
            let result = match self.create(session_id, path, &files[path]).await {
                Ok(()) => BatchResult {
                    path: path.clone(),
                    success: true,
                    result: None,
                    error: None,
                },
                Err(e) => BatchResult {
                    path: path.clone(),
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);
        }

        self.registry
            .log_activity(session_id, &format!("Batch created {} files", files.len()))
            .await;
        results
    }

    /// Search file contents (and names) for a substring. Returns the
    /// matching lines per file, keyed by path relative to the search root.
    pub async fn search(
        &self,
        session_id: Uuid,
        dir: &str,
        pattern: &str,
        recursive: bool,
    ) -> Result<HashMap<String, Vec<String>>> {
        let full = self.resolve(session_id, dir).await?;
        let needle = pattern.to_string();

        let results = tokio::task::spawn_blocking(move || {
            let mut results = HashMap::new();
            search_tree(&full, &full, &needle, recursive, &mut results);
            results
        })
        .await
        .map_err(|e| Error::Internal(format!("search task failed: {e}")))?;

        self.registry
            .log_activity(
                session_id,
                &format!("Searched for pattern '{pattern}' in {dir}"),
            )
            .await;
        Ok(results)
    }

    /// Export the directory structure under `dir` as pretty-printed JSON.
    /// `depth == 0` means unlimited.
    pub async fn export_structure(
        &self,
        session_id: Uuid,
        dir: &str,
        depth: usize,
    ) -> Result<String> {
        let full = self.resolve(session_id, dir).await?;

        let structure = tokio::task::spawn_blocking(move || build_structure(&full, 0, depth))
            .await
            .map_err(|e| Error::Internal(format!("structure task failed: {e}")))??;

        self.registry
            .log_activity(session_id, &format!("Exported file structure for {dir}"))
            .await;
        Ok(serde_json::to_string_pretty(&structure)
            .map_err(|e| Error::Internal(format!("failed to serialize structure: {e}")))?)
    }
}

/// Permission bits for directories created on behalf of a session.
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// Permission bits for files created on behalf of a session.
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// `mkdir -p` that pins every directory this call creates to mode 0755,
/// independent of the process umask. Pre-existing directories keep their
/// modes.
#[cfg(unix)]
pub(crate) async fn create_dir_all_with_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut created: Vec<PathBuf> = Vec::new();
    let mut current = Some(path);
    while let Some(dir) = current {
        if tokio::fs::metadata(dir).await.is_ok() {
            break;
        }
        created.push(dir.to_path_buf());
        current = dir.parent();
    }

    tokio::fs::create_dir_all(path).await?;
    for dir in created.iter().rev() {
        tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(DIR_MODE)).await?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) async fn create_dir_all_with_mode(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Pin a created file's permission bits to 0644 regardless of umask.
#[cfg(unix)]
pub(crate) async fn set_file_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE)).await
}

#[cfg(not(unix))]
pub(crate) async fn set_file_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Recursive structure walk: directories become nested objects, files become
/// `{size, modTime}` leaves.
pub(crate) fn build_structure(
    path: &Path,
    current_depth: usize,
    max_depth: usize,
) -> Result<serde_json::Value> {
    let mut node = serde_json::Map::new();
    if max_depth > 0 && current_depth >= max_depth {
        return Ok(serde_json::Value::Object(node));
    }

    let mut entries: Vec<_> = std::fs::read_dir(path)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(meta) = entry.metadata() else {
            continue;
        };

        if meta.is_dir() {
            let child = build_structure(&entry.path(), current_depth + 1, max_depth)?;
            node.insert(name, child);
        } else {
            let mod_time: DateTime<Utc> = meta
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());
            node.insert(
                name,
                serde_json::json!({
                    "size": meta.len(),
                    "modTime": mod_time,
                }),
            );
        }
    }

    Ok(serde_json::Value::Object(node))
}

fn search_tree(
    root: &Path,
    dir: &Path,
    pattern: &str,
    recursive: bool,
    results: &mut HashMap<String, Vec<String>>,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };

        if meta.is_dir() {
            if recursive {
                search_tree(root, &path, pattern, recursive, results);
            }
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        let name_matches = entry.file_name().to_string_lossy().contains(pattern);

        // Unreadable files are skipped, not errors.
        let Ok(bytes) = std::fs::read(&path) else {
            if name_matches {
                results.insert(rel, Vec::new());
            }
            continue;
        };
        let content = String::from_utf8_lossy(&bytes);

        let matches: Vec<String> = content
            .lines()
            .filter(|line| line.contains(pattern))
            .map(str::to_string)
            .collect();

        if !matches.is_empty() || name_matches {
            results.insert(rel, matches);
        }
    }
}

fn build_metadata(name: &str, rel_path: &str, meta: &std::fs::Metadata) -> FileMetadata {
    let mod_time: DateTime<Utc> = meta
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());

    FileMetadata {
        name: name.to_string(),
        path: rel_path.to_string(),
        size: meta.len(),
        mod_time,
        is_dir: meta.is_dir(),
        content_type: content_type_by_ext(name),
        permissions: format_permissions(meta),
    }
}

/// MIME type guessed from the file extension; empty when there is no
/// extension.
fn content_type_by_ext(name: &str) -> String {
    let Some(ext) = Path::new(name).extension() else {
        return String::new();
    };

    match ext.to_string_lossy().to_lowercase().as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "js" => "application/javascript",
        "json" => "application/json",
        "css" => "text/css",
        "go" => "text/x-go",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "md" => "text/markdown",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// `ls -l` style permission string.
#[cfg(unix)]
fn format_permissions(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    let mode = meta.permissions().mode();
    let mut out = String::with_capacity(10);
    out.push(if meta.is_dir() { 'd' } else { '-' });
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn format_permissions(meta: &std::fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "r--r--r--".to_string()
    } else {
        "rw-rw-rw-".to_string()
    }
}
