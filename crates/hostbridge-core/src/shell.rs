//! Shell selection and validation
//!
//! Both the foreground executor and the background supervisor choose the
//! child's shell the same way: the session's `SHELL` variable when it names
//! an executable regular file, `/bin/bash` otherwise. Validation results are
//! cached per path to avoid repeated stat syscalls.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// Fallback shell when the session's choice is missing or unusable.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Shell paths probed for `/system/shells`.
const SHELL_CANDIDATES: [&str; 13] = [
    "/bin/bash",
    "/bin/sh",
    "/bin/zsh",
    "/bin/fish",
    "/bin/dash",
    "/usr/bin/bash",
    "/usr/bin/zsh",
    "/usr/bin/fish",
    "/usr/bin/dash",
    "/usr/local/bin/bash",
    "/usr/local/bin/zsh",
    "/usr/local/bin/fish",
    "/usr/bin/sh",
];

/// Shell names resolved through `which` to catch nonstandard installs.
const SHELL_NAMES: [&str; 7] = ["bash", "zsh", "fish", "dash", "ksh", "csh", "tcsh"];

/// Validates and caches shell paths.
pub struct ShellResolver {
    valid_shells: Mutex<HashMap<String, bool>>,
}

impl ShellResolver {
    pub fn new() -> Self {
        Self {
            valid_shells: Mutex::new(HashMap::new()),
        }
    }

    /// Pick the shell for a spawn: `candidate` when valid, the default
    /// otherwise. An invalid candidate logs a warning rather than failing
    /// the spawn.
    pub fn resolve(&self, candidate: Option<&str>) -> String {
        match candidate {
            Some(shell) if !shell.is_empty() => {
                if self.is_valid(shell) {
                    shell.to_string()
                } else {
                    warn!(
                        shell,
                        fallback = DEFAULT_SHELL,
                        "shell is not an executable regular file, using fallback"
                    );
                    DEFAULT_SHELL.to_string()
                }
            }
            _ => DEFAULT_SHELL.to_string(),
        }
    }

    /// Whether `path` names an executable regular file. Results are cached.
    pub fn is_valid(&self, path: &str) -> bool {
        if let Ok(cache) = self.valid_shells.lock() {
            if let Some(&valid) = cache.get(path) {
                return valid;
            }
        }

        let valid = check_shell_path(path);
        if let Ok(mut cache) = self.valid_shells.lock() {
            cache.insert(path.to_string(), valid);
        }
        valid
    }
}

impl Default for ShellResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn check_shell_path(path: &str) -> bool {
    use std::os::unix::fs::PermissionsExt;

    if path.is_empty() || !path.starts_with('/') {
        return false;
    }
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn check_shell_path(path: &str) -> bool {
    Path::new(path).is_file()
}

/// Probe the host for installed shells: stat a fixed candidate list, then
/// augment with `which` lookups for common shell names.
pub async fn available_shells() -> BTreeMap<String, bool> {
    let mut shells = BTreeMap::new();
    for candidate in SHELL_CANDIDATES {
        shells.insert(candidate.to_string(), Path::new(candidate).exists());
    }

    for name in SHELL_NAMES {
        if let Ok(output) = tokio::process::Command::new("which")
            .arg(name)
            .output()
            .await
        {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    shells.entry(path).or_insert(true);
                }
            }
        }
    }

    shells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_valid_candidate() {
        let resolver = ShellResolver::new();
        assert_eq!(resolver.resolve(Some("/bin/sh")), "/bin/sh");
    }

    #[test]
    fn test_resolve_falls_back_on_missing_shell() {
        let resolver = ShellResolver::new();
        assert_eq!(resolver.resolve(Some("/no/such/shell")), DEFAULT_SHELL);
        assert_eq!(resolver.resolve(Some("")), DEFAULT_SHELL);
        assert_eq!(resolver.resolve(None), DEFAULT_SHELL);
    }

    #[test]
    fn test_relative_paths_are_invalid() {
        let resolver = ShellResolver::new();
        assert!(!resolver.is_valid("bash"));
    }

    #[test]
    fn test_non_executable_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notashell");
        std::fs::write(&file, "#!/bin/sh\n").unwrap();

        let resolver = ShellResolver::new();
        assert!(!resolver.is_valid(file.to_str().unwrap()));
    }

    #[test]
    fn test_validation_is_cached() {
        let resolver = ShellResolver::new();
        assert!(resolver.is_valid("/bin/sh"));
        // Second call hits the cache; same answer either way.
        assert!(resolver.is_valid("/bin/sh"));
        let cache = resolver.valid_shells.lock().unwrap();
        assert_eq!(cache.get("/bin/sh"), Some(&true));
    }

    #[tokio::test]
    async fn test_available_shells_includes_sh() {
        let shells = available_shells().await;
        assert_eq!(shells.get("/bin/sh"), Some(&true));
    }
}
