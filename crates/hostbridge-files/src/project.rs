//! Project context extraction
//!
//! Walks a session's working directory to summarize the project and to
//! assemble a code-context report: key files with their contents, per-file
//! imports pulled out by language-specific regex heuristics, and
//! project-level dependencies parsed from manifest files.

use crate::ops::{build_structure, FileMetadata};
use chrono::{DateTime, Utc};
use hostbridge_core::{Error, Result, SessionRegistry};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Files larger than this are never pulled into a context report.
const MAX_CONTEXT_FILE_SIZE: u64 = 1024 * 1024;

/// How many files the summary samples for `recentFiles`.
const RECENT_FILE_SAMPLE: usize = 5;

/// Directory depth of the structure embedded in a context report.
const STRUCTURE_DEPTH: usize = 3;

/// Overview of the project under the session working directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub name: String,
    pub root_path: String,
    pub file_count: usize,
    pub dir_count: usize,
    pub total_size: u64,
    pub file_types: HashMap<String, usize>,
    pub key_files: Vec<String>,
    pub recent_files: Vec<FileMetadata>,
}

/// Content and extracted imports for one file in a context report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub language: String,
}

/// Contextual report about a codebase, shaped for LLM consumption.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeContext {
    pub project_name: String,
    pub main_files: HashMap<String, FileInfo>,
    #[serde(rename = "projectDependencies", skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    pub file_structure: serde_json::Value,
}

/// Session-facing project analysis service.
pub struct ProjectContext {
    registry: Arc<SessionRegistry>,
}

impl ProjectContext {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Walk the working directory and summarize what lives there. Hidden
    /// files and directories are skipped.
    pub async fn summary(&self, session_id: Uuid) -> Result<ProjectSummary> {
        let session = self.registry.get(session_id).await?;
        let root = session.require_working_dir().await?;

        let summary = tokio::task::spawn_blocking(move || build_summary(&root))
            .await
            .map_err(|e| Error::Internal(format!("summary task failed: {e}")))??;

        self.registry
            .log_activity(
                session_id,
                &format!("Generated project summary for {}", summary.name),
            )
            .await;
        info!(session = %session_id, project = %summary.name, "generated project summary");
        Ok(summary)
    }

    /// Assemble the code-context report: structure, project dependencies,
    /// and up to `max_files` file bodies with their imports.
    pub async fn code_context(&self, session_id: Uuid, max_files: usize) -> Result<CodeContext> {
        let session = self.registry.get(session_id).await?;
        let root = session.require_working_dir().await?;
        let summary = self.summary(session_id).await?;

        let context = tokio::task::spawn_blocking(move || {
            let mut context = CodeContext {
                project_name: summary.name.clone(),
                main_files: HashMap::new(),
                dependencies: project_dependencies(&root),
                file_structure: build_structure(&root, 0, STRUCTURE_DEPTH)
                    .unwrap_or(serde_json::Value::Null),
            };

            for key_file in &summary.key_files {
                if context.main_files.len() >= max_files {
                    break;
                }
                if let Some(info) = read_file_info(&root, key_file) {
                    context.main_files.insert(key_file.clone(), info);
                }
            }

            // No key files found: fall back to the smallest regular files,
            // which tend to be configuration.
            if context.main_files.is_empty() {
                let mut candidates = summary.recent_files.clone();
                candidates.sort_by_key(|f| f.size);
                for file in candidates {
                    if context.main_files.len() >= max_files {
                        break;
                    }
                    if file.is_dir || file.size > MAX_CONTEXT_FILE_SIZE {
                        continue;
                    }
                    if let Some(info) = read_file_info(&root, &file.path) {
                        context.main_files.insert(file.path.clone(), info);
                    }
                }
            }

            context
        })
        .await
        .map_err(|e| Error::Internal(format!("context task failed: {e}")))?;

        self.registry
            .log_activity(
                session_id,
                &format!(
                    "Extracted code context with {} main files",
                    context.main_files.len()
                ),
            )
            .await;
        Ok(context)
    }
}

fn build_summary(root: &Path) -> Result<ProjectSummary> {
    let mut summary = ProjectSummary {
        name: root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string()),
        root_path: root.display().to_string(),
        file_count: 0,
        dir_count: 0,
        total_size: 0,
        file_types: HashMap::new(),
        key_files: Vec::new(),
        recent_files: Vec::new(),
    };

    walk_project(root, root, &mut summary)?;
    summary.key_files.sort();
    Ok(summary)
}

fn walk_project(root: &Path, dir: &Path, summary: &mut ProjectSummary) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let path = entry.path();

        if meta.is_dir() {
            summary.dir_count += 1;
            walk_project(root, &path, summary)?;
            continue;
        }

        summary.file_count += 1;
        summary.total_size += meta.len();

        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        *summary.file_types.entry(ext).or_insert(0) += 1;

        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();

        if summary.recent_files.len() < RECENT_FILE_SAMPLE {
            let mod_time: DateTime<Utc> = meta
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());
            summary.recent_files.push(FileMetadata {
                name: name.clone(),
                path: rel.clone(),
                size: meta.len(),
                mod_time,
                is_dir: false,
                content_type: String::new(),
                permissions: String::new(),
            });
        }

        if is_key_file(&rel) {
            summary.key_files.push(rel);
        }
    }

    Ok(())
}

lazy_static! {
    static ref MAIN_FILE_PATTERN: Regex =
        Regex::new(r"^(?:main|app|index|server)\..+$").expect("main file pattern");
}

/// Whether a file is likely central to the project: a well-known manifest or
/// an entry-point source file.
fn is_key_file(path: &str) -> bool {
    let filename = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    const KEY_NAMES: [&str; 14] = [
        "go.mod",
        "go.sum",
        "package.json",
        "package-lock.json",
        "cargo.toml",
        "dockerfile",
        "docker-compose.yml",
        "makefile",
        "readme.md",
        "main.go",
        "app.js",
        "index.js",
        "index.ts",
        "index.html",
    ];
    if KEY_NAMES.contains(&filename.as_str()) {
        return true;
    }

    MAIN_FILE_PATTERN.is_match(&filename)
}

fn read_file_info(root: &Path, relative: &str) -> Option<FileInfo> {
    let full = root.join(relative);
    let meta = std::fs::metadata(&full).ok()?;
    if meta.len() > MAX_CONTEXT_FILE_SIZE {
        return None;
    }
    let bytes = std::fs::read(&full).ok()?;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    let ext = full
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    Some(FileInfo {
        dependencies: file_dependencies(&content, &ext),
        size: meta.len(),
        mod_time: meta
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now()),
        language: detect_language(&ext).to_string(),
        content,
    })
}

/// Programming language for a file extension.
pub fn detect_language(ext: &str) -> &'static str {
    match ext {
        ".go" => "Go",
        ".js" => "JavaScript",
        ".ts" | ".tsx" => "TypeScript",
        ".jsx" => "JSX",
        ".py" => "Python",
        ".java" => "Java",
        ".rb" => "Ruby",
        ".php" => "PHP",
        ".rs" => "Rust",
        ".cs" => "C#",
        ".c" | ".h" => "C",
        ".cpp" | ".cc" | ".cxx" | ".hpp" => "C++",
        ".swift" => "Swift",
        ".kt" | ".kts" => "Kotlin",
        ".scala" => "Scala",
        ".dart" => "Dart",
        ".r" => "R",
        ".sh" | ".bash" => "Shell",
        ".pl" => "Perl",
        ".ex" | ".exs" => "Elixir",
        ".hs" => "Haskell",
        ".clj" => "Clojure",
        ".lua" => "Lua",
        ".sql" => "SQL",
        ".html" | ".htm" => "HTML",
        ".css" => "CSS",
        ".scss" => "SCSS",
        ".less" => "Less",
        ".json" => "JSON",
        ".xml" => "XML",
        ".yaml" | ".yml" => "YAML",
        ".md" => "Markdown",
        ".txt" => "Text",
        _ => "Unknown",
    }
}

lazy_static! {
    static ref GO_IMPORT: Regex =
        Regex::new(r#"(?m)^\s*import\s+\(\s*((?s:.)*?)\s*\)|^\s*import\s+"(.*?)""#)
            .expect("go import pattern");
    static ref QUOTED: Regex = Regex::new(r#""([^"]+)""#).expect("quoted pattern");
    static ref JS_ES6_IMPORT: Regex =
        Regex::new(r#"(?m)import\s+(?:(?:\{[^}]*\})|(?:[\w*]+))\s+from\s+['"]([^'"]+)['"]"#)
            .expect("es6 import pattern");
    static ref JS_REQUIRE: Regex = Regex::new(
        r#"(?m)(?:const|let|var)\s+(?:\{[^}]*\}|\w+)\s*=\s*require\(['"]([^'"]+)['"]\)"#
    )
    .expect("require pattern");
    static ref PY_IMPORT: Regex =
        Regex::new(r"(?m)^\s*import\s+([\w.]+)(?:\s+as\s+\w+)?|^\s*from\s+([\w.]+)\s+import")
            .expect("python import pattern");
    static ref JAVA_IMPORT: Regex =
        Regex::new(r"(?m)^\s*import\s+(?:static\s+)?([\w.]+?)(?:\.\*)?;").expect("java import pattern");
    static ref RUBY_REQUIRE: Regex =
        Regex::new(r#"(?m)^\s*require\s+['"]([\w\-/]+)['"]"#).expect("ruby require pattern");
    static ref RUBY_GEM: Regex =
        Regex::new(r#"(?m)^\s*gem\s+['"]([\w\-]+)['"]"#).expect("ruby gem pattern");
    static ref PHP_USE: Regex = Regex::new(r"(?m)^\s*use\s+([\w\\]+)").expect("php use pattern");
    static ref PHP_REQUIRE: Regex =
        Regex::new(r#"(?:require|include)(?:_once)?\s*\(\s*['"]([\w\-./]+)['"]"#)
            .expect("php require pattern");
    static ref RUST_USE: Regex = Regex::new(r"(?m)^\s*use\s+([\w:]+)").expect("rust use pattern");
    static ref RUST_EXTERN: Regex =
        Regex::new(r"(?m)^\s*extern\s+crate\s+(\w+)").expect("rust extern pattern");
    static ref CSHARP_USING: Regex =
        Regex::new(r"(?m)^\s*using\s+([\w.]+);").expect("csharp using pattern");
    static ref C_INCLUDE: Regex =
        Regex::new(r#"(?m)#\s*include\s*[<"]([^>"]+)[>"]"#).expect("c include pattern");
}

/// Extract imported modules from a file body, dispatching on extension.
pub fn file_dependencies(content: &str, ext: &str) -> Vec<String> {
    match ext {
        ".go" => go_dependencies(content),
        ".js" | ".jsx" | ".ts" | ".tsx" => js_dependencies(content),
        ".py" => python_dependencies(content),
        ".java" => java_dependencies(content),
        ".rb" => ruby_dependencies(content),
        ".php" => php_dependencies(content),
        ".rs" => rust_dependencies(content),
        ".cs" => csharp_dependencies(content),
        ".c" | ".cpp" | ".cc" | ".h" | ".hpp" => c_dependencies(content),
        _ => Vec::new(),
    }
}

fn push_unique(deps: &mut Vec<String>, value: String) {
    if !value.is_empty() && !deps.contains(&value) {
        deps.push(value);
    }
}

fn go_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in GO_IMPORT.captures_iter(content) {
        if let Some(block) = caps.get(1) {
            for quoted in QUOTED.captures_iter(block.as_str()) {
                push_unique(&mut deps, quoted[1].to_string());
            }
        } else if let Some(single) = caps.get(2) {
            push_unique(&mut deps, single.as_str().to_string());
        }
    }
    deps
}

fn js_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in JS_ES6_IMPORT.captures_iter(content) {
        push_unique(&mut deps, caps[1].to_string());
    }
    for caps in JS_REQUIRE.captures_iter(content) {
        push_unique(&mut deps, caps[1].to_string());
    }
    deps
}

fn python_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in PY_IMPORT.captures_iter(content) {
        let module = caps.get(1).or_else(|| caps.get(2));
        if let Some(module) = module {
            let base = module.as_str().split('.').next().unwrap_or_default();
            push_unique(&mut deps, base.to_string());
        }
    }
    deps
}

fn java_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in JAVA_IMPORT.captures_iter(content) {
        let base = caps[1].split('.').next().unwrap_or_default();
        push_unique(&mut deps, base.to_string());
    }
    deps
}

fn ruby_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in RUBY_REQUIRE.captures_iter(content) {
        push_unique(&mut deps, caps[1].to_string());
    }
    for caps in RUBY_GEM.captures_iter(content) {
        push_unique(&mut deps, caps[1].to_string());
    }
    deps
}

fn php_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in PHP_USE.captures_iter(content) {
        let base = caps[1].split('\\').next().unwrap_or_default();
        push_unique(&mut deps, base.to_string());
    }
    for caps in PHP_REQUIRE.captures_iter(content) {
        push_unique(&mut deps, caps[1].to_string());
    }
    deps
}

fn rust_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in RUST_USE.captures_iter(content) {
        let base = caps[1].split("::").next().unwrap_or_default();
        if base != "std" && base != "core" && base != "crate" && base != "self" && base != "super" {
            push_unique(&mut deps, base.to_string());
        }
    }
    for caps in RUST_EXTERN.captures_iter(content) {
        push_unique(&mut deps, caps[1].to_string());
    }
    deps
}

fn csharp_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in CSHARP_USING.captures_iter(content) {
        let base = caps[1].split('.').next().unwrap_or_default();
        push_unique(&mut deps, base.to_string());
    }
    deps
}

fn c_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in C_INCLUDE.captures_iter(content) {
        push_unique(&mut deps, caps[1].to_string());
    }
    deps
}

lazy_static! {
    static ref GO_MOD_BLOCK: Regex =
        Regex::new(r"(?m)^\s*require\s+\(\s*((?s:.)*?)\s*\)").expect("go.mod block pattern");
    static ref GO_MOD_LINE: Regex =
        Regex::new(r"(?m)^\s*([\w./\-@]+)\s+(v[\w.\-]+)").expect("go.mod line pattern");
    static ref GO_MOD_SINGLE: Regex =
        Regex::new(r"(?m)^\s*require\s+([\w./\-@]+)\s+(v[\w.\-]+)").expect("go.mod single pattern");
    static ref GEMFILE_GEM: Regex =
        Regex::new(r#"(?m)^\s*gem\s+['"]([^'"]+)['"](?:\s*,\s*['"]([^'"]+)['"])?"#)
            .expect("gemfile pattern");
    static ref CARGO_DEPS_SECTION: Regex =
        Regex::new(r"(?ms)^\[dependencies\]\s*$(.*?)(?:^\[|\z)").expect("cargo section pattern");
    static ref POM_DEPENDENCY: Regex = Regex::new(
        r"(?s)<dependency>.*?<groupId>(.*?)</groupId>.*?<artifactId>(.*?)</artifactId>.*?<version>(.*?)</version>.*?</dependency>"
    )
    .expect("pom pattern");
    static ref GRADLE_IMPL: Regex =
        Regex::new(r#"(?m)implementation\s+['"]([^'"]+)['"]"#).expect("gradle pattern");
}

/// Dependencies declared by the manifest files present in `root`.
pub fn project_dependencies(root: &Path) -> Vec<String> {
    type Extractor = fn(&str) -> Vec<String>;
    const MANIFESTS: [(&str, Extractor); 8] = [
        ("go.mod", go_mod_dependencies),
        ("package.json", package_json_dependencies),
        ("requirements.txt", requirements_txt_dependencies),
        ("Gemfile", gemfile_dependencies),
        ("composer.json", composer_json_dependencies),
        ("Cargo.toml", cargo_toml_dependencies),
        ("pom.xml", pom_xml_dependencies),
        ("build.gradle", gradle_dependencies),
    ];

    let mut dependencies = Vec::new();
    for (manifest, extract) in MANIFESTS {
        let path = root.join(manifest);
        if let Ok(content) = std::fs::read_to_string(&path) {
            dependencies.extend(extract(&content));
        }
    }
    dependencies
}

fn go_mod_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in GO_MOD_BLOCK.captures_iter(content) {
        for line in GO_MOD_LINE.captures_iter(&caps[1]) {
            deps.push(format!("{} {}", &line[1], &line[2]));
        }
    }
    // Single-line requires outside a block.
    for caps in GO_MOD_SINGLE.captures_iter(content) {
        deps.push(format!("{} {}", &caps[1], &caps[2]));
    }
    deps
}

fn package_json_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    let Ok(pkg) = serde_json::from_str::<serde_json::Value>(content) else {
        return deps;
    };

    if let Some(map) = pkg.get("dependencies").and_then(|d| d.as_object()) {
        for (name, version) in map {
            deps.push(format!("{name}: {}", version.as_str().unwrap_or_default()));
        }
    }
    if let Some(map) = pkg.get("devDependencies").and_then(|d| d.as_object()) {
        for (name, version) in map {
            deps.push(format!(
                "{name} (dev): {}",
                version.as_str().unwrap_or_default()
            ));
        }
    }
    deps.sort();
    deps
}

fn requirements_txt_dependencies(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn gemfile_dependencies(content: &str) -> Vec<String> {
    GEMFILE_GEM
        .captures_iter(content)
        .map(|caps| match caps.get(2) {
            Some(version) => format!("{}: {}", &caps[1], version.as_str()),
            None => caps[1].to_string(),
        })
        .collect()
}

fn composer_json_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    let Ok(composer) = serde_json::from_str::<serde_json::Value>(content) else {
        return deps;
    };

    if let Some(map) = composer.get("require").and_then(|d| d.as_object()) {
        for (name, version) in map {
            deps.push(format!("{name}: {}", version.as_str().unwrap_or_default()));
        }
    }
    if let Some(map) = composer.get("require-dev").and_then(|d| d.as_object()) {
        for (name, version) in map {
            deps.push(format!(
                "{name} (dev): {}",
                version.as_str().unwrap_or_default()
            ));
        }
    }
    deps.sort();
    deps
}

fn cargo_toml_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    if let Some(caps) = CARGO_DEPS_SECTION.captures(content) {
        for line in caps[1].lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((name, version)) = line.split_once('=') {
                deps.push(format!("{} = {}", name.trim(), version.trim()));
            }
        }
    }
    deps
}

fn pom_xml_dependencies(content: &str) -> Vec<String> {
    POM_DEPENDENCY
        .captures_iter(content)
        .map(|caps| format!("{}:{}:{}", &caps[1], &caps[2], &caps[3]))
        .collect()
}

fn gradle_dependencies(content: &str) -> Vec<String> {
    GRADLE_IMPL
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests;
