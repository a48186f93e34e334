//! Web API module for hostbridge
//!
//! Thin JSON adapters over the core services. Each resource contributes a
//! `*_routes()` router; the two service routers merge them:
//! - terminal: sessions, commands, processes, env, history, system
//! - files: sessions, files, directories, diff, project

pub mod commands;
pub mod diff;
pub mod directories;
pub mod env;
pub mod error;
pub mod files;
pub mod history;
pub mod processes;
pub mod project;
pub mod sessions;
pub mod system;

use axum::Router;
use hostbridge_core::{
    CommandExecutor, HistoryLog, ProcessSupervisor, SessionRegistry, ShellResolver,
};
use hostbridge_files::{DiffEngine, DirectoryOperations, FileOperations, ProjectContext};
use std::sync::Arc;

pub use error::{ApiError, ApiResult};

/// Shared state for the terminal service handlers.
#[derive(Clone)]
pub struct TerminalState {
    pub registry: Arc<SessionRegistry>,
    pub history: Arc<HistoryLog>,
    pub executor: Arc<CommandExecutor>,
    pub supervisor: Arc<ProcessSupervisor>,
}

impl TerminalState {
    /// Wire up the terminal service object graph.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        let history = Arc::new(HistoryLog::default());
        let shells = Arc::new(ShellResolver::new());
        let executor = Arc::new(CommandExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&history),
            Arc::clone(&shells),
        ));
        let supervisor = Arc::new(ProcessSupervisor::new(
            Arc::clone(&registry),
            Arc::clone(&history),
            Arc::clone(&shells),
        ));
        Self {
            registry,
            history,
            executor,
            supervisor,
        }
    }
}

/// Shared state for the file service handlers.
#[derive(Clone)]
pub struct FilesState {
    pub registry: Arc<SessionRegistry>,
    pub files: Arc<FileOperations>,
    pub dirs: Arc<DirectoryOperations>,
    pub diff: Arc<DiffEngine>,
    pub project: Arc<ProjectContext>,
}

impl FilesState {
    /// Wire up the file service object graph.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        let files = Arc::new(FileOperations::new(Arc::clone(&registry)));
        let dirs = Arc::new(DirectoryOperations::new(Arc::clone(&registry)));
        let diff = Arc::new(DiffEngine::new(Arc::clone(&registry), Arc::clone(&files)));
        let project = Arc::new(ProjectContext::new(Arc::clone(&registry)));
        Self {
            registry,
            files,
            dirs,
            diff,
            project,
        }
    }
}

/// Router for the terminal service.
pub fn terminal_router(state: TerminalState) -> Router {
    Router::new()
        .merge(sessions::sessions_routes(Arc::clone(&state.registry)))
        .merge(system::system_routes(Arc::clone(&state.registry)))
        .merge(commands::commands_routes(state.clone()))
        .merge(processes::processes_routes(state.clone()))
        .merge(env::env_routes(Arc::clone(&state.registry)))
        .merge(history::history_routes(state))
}

/// Router for the file service.
pub fn files_router(state: FilesState) -> Router {
    Router::new()
        .merge(sessions::sessions_routes(Arc::clone(&state.registry)))
        .merge(files::files_routes(state.clone()))
        .merge(directories::directories_routes(state.clone()))
        .merge(diff::diff_routes(state.clone()))
        .merge(project::project_routes(state))
}
