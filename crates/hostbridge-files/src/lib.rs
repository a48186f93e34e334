//! Hostbridge Files - Session-Scoped Filesystem Services
//!
//! This crate provides the FileService internals for hostbridge:
//! - Ops: file CRUD, metadata, batch operations, content search
//! - Dirs: directory listing, trees, sizes
//! - Diff: text diff generation and fuzzy patch application
//! - Project: project summaries and code-context extraction

#![forbid(unsafe_code)]

pub mod diff;
pub mod dirs;
pub mod ops;
pub mod project;

pub use diff::{
    apply_patch, make_patch, patch_from_text, patch_to_text, DiffEngine, DiffRequest, Hunk,
    PatchRequest,
};
pub use dirs::{DirectoryEntry, DirectoryOperations};
pub use ops::{BatchResult, FileMetadata, FileOperations};
pub use project::{CodeContext, FileInfo, ProjectContext, ProjectSummary};
