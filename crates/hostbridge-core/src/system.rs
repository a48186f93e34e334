//! Host introspection for the system endpoints.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

/// Static facts about the host the service runs on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub distribution: String,
    pub architecture: String,
    #[serde(rename = "numCPU")]
    pub num_cpu: usize,
    pub current_time: DateTime<Utc>,
    pub timezone: String,
}

/// Gather host facts. Every field degrades gracefully when the host does not
/// expose it.
pub fn system_info() -> SystemInfo {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    SystemInfo {
        hostname,
        os: std::env::consts::OS.to_string(),
        distribution: distribution_name(),
        architecture: std::env::consts::ARCH.to_string(),
        num_cpu: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        current_time: Utc::now(),
        timezone: Local::now().format("%Z").to_string(),
    }
}

/// The Linux distribution name from `/etc/os-release`, falling back to
/// `/etc/lsb-release`, falling back to the bare OS name.
fn distribution_name() -> String {
    if std::env::consts::OS != "linux" {
        return std::env::consts::OS.to_string();
    }

    if let Some(name) = parse_release_file("/etc/os-release", "NAME=") {
        return name;
    }
    if let Some(name) = parse_release_file("/etc/lsb-release", "DISTRIB_DESCRIPTION=") {
        return name;
    }

    std::env::consts::OS.to_string()
}

fn parse_release_file(path: &str, key: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    for line in content.lines() {
        if let Some(value) = line.strip_prefix(key) {
            let value = value.trim_matches('"');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}
