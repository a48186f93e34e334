use super::*;
use hostbridge_core::SessionRegistry;
use tempfile::TempDir;

async fn setup() -> (ProjectContext, Uuid, TempDir) {
    let registry = Arc::new(SessionRegistry::new());
    let project = ProjectContext::new(Arc::clone(&registry));

    let dir = tempfile::tempdir().unwrap();
    let view = registry.create().await;
    registry
        .set_working_dir(view.id, dir.path().to_str().unwrap())
        .await
        .unwrap();

    (project, view.id, dir)
}

#[tokio::test]
async fn test_summary_counts_and_types() {
    let (project, id, dir) = setup().await;

    std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();
    std::fs::write(dir.path().join("readme.md"), "# hi\n").unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/util.go"), "package src\n").unwrap();
    // Hidden entries are skipped entirely.
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    std::fs::write(dir.path().join(".git/config"), "x").unwrap();
    std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();

    let summary = project.summary(id).await.unwrap();
    assert_eq!(summary.file_count, 3);
    assert_eq!(summary.dir_count, 1);
    assert_eq!(summary.file_types.get(".go"), Some(&2));
    assert_eq!(summary.file_types.get(".md"), Some(&1));
    assert!(summary.key_files.contains(&"main.go".to_string()));
    assert!(summary.key_files.contains(&"readme.md".to_string()));
    assert!(!summary.recent_files.is_empty());
}

#[tokio::test]
async fn test_code_context_reads_key_files() {
    let (project, id, dir) = setup().await;

    std::fs::write(
        dir.path().join("main.go"),
        "package main\n\nimport \"fmt\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("go.mod"),
        "module example.com/demo\n\nrequire (\n\tgithub.com/labstack/echo/v4 v4.11.1\n)\n",
    )
    .unwrap();

    let context = project.code_context(id, 10).await.unwrap();
    assert_eq!(context.project_name, dir.path().file_name().unwrap().to_str().unwrap());
    assert!(context.main_files.contains_key("main.go"));
    let main = &context.main_files["main.go"];
    assert_eq!(main.language, "Go");
    assert_eq!(main.dependencies, vec!["fmt"]);
    assert!(context
        .dependencies
        .iter()
        .any(|d| d.contains("github.com/labstack/echo/v4")));
    assert!(context.file_structure.get("main.go").is_some());
}

#[tokio::test]
async fn test_code_context_falls_back_to_small_files() {
    let (project, id, dir) = setup().await;

    std::fs::write(dir.path().join("notes.txt"), "just notes\n").unwrap();
    let context = project.code_context(id, 5).await.unwrap();
    assert!(context.main_files.contains_key("notes.txt"));
}

#[tokio::test]
async fn test_max_files_cap() {
    let (project, id, dir) = setup().await;

    std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log(1)\n").unwrap();
    std::fs::write(dir.path().join("index.ts"), "export {}\n").unwrap();

    let context = project.code_context(id, 2).await.unwrap();
    assert_eq!(context.main_files.len(), 2);
}

#[test]
fn test_is_key_file() {
    assert!(is_key_file("package.json"));
    assert!(is_key_file("sub/dir/Cargo.toml"));
    assert!(is_key_file("Makefile"));
    assert!(is_key_file("server.py"));
    assert!(is_key_file("app.rb"));
    assert!(!is_key_file("helper.py"));
    assert!(!is_key_file("main"));
}

#[test]
fn test_detect_language() {
    assert_eq!(detect_language(".rs"), "Rust");
    assert_eq!(detect_language(".tsx"), "TypeScript");
    assert_eq!(detect_language(".weird"), "Unknown");
}

#[test]
fn test_go_dependencies() {
    let content = r#"package main

import (
    "fmt"
    "net/http"
)

import "os"
"#;
    let deps = file_dependencies(content, ".go");
    assert_eq!(deps, vec!["fmt", "net/http", "os"]);
}

#[test]
fn test_js_dependencies() {
    let content = r#"
import React from 'react';
import { useState } from "react";
const path = require('path');
let { join } = require("node:path");
"#;
    let deps = file_dependencies(content, ".js");
    assert_eq!(deps, vec!["react", "path", "node:path"]);
}

#[test]
fn test_python_dependencies() {
    let content = "import os\nimport numpy as np\nfrom collections.abc import Mapping\n";
    let deps = file_dependencies(content, ".py");
    assert_eq!(deps, vec!["os", "numpy", "collections"]);
}

#[test]
fn test_java_dependencies() {
    let content = "import java.util.List;\nimport static org.junit.Assert.*;\n";
    let deps = file_dependencies(content, ".java");
    assert_eq!(deps, vec!["java", "org"]);
}

#[test]
fn test_rust_dependencies() {
    let content = "use std::io;\nuse serde::Serialize;\nuse crate::ops;\nextern crate regex;\n";
    let deps = file_dependencies(content, ".rs");
    assert_eq!(deps, vec!["serde", "regex"]);
}

#[test]
fn test_c_dependencies() {
    let content = "#include <stdio.h>\n#include \"local.h\"\n";
    let deps = file_dependencies(content, ".c");
    assert_eq!(deps, vec!["stdio.h", "local.h"]);
}

#[test]
fn test_package_json_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("package.json"),
        r#"{"dependencies": {"express": "^4.18.0"}, "devDependencies": {"jest": "^29.0.0"}}"#,
    )
    .unwrap();

    let deps = project_dependencies(dir.path());
    assert!(deps.contains(&"express: ^4.18.0".to_string()));
    assert!(deps.contains(&"jest (dev): ^29.0.0".to_string()));
}

#[test]
fn test_requirements_txt_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("requirements.txt"),
        "# comment\nrequests==2.31.0\n\nflask>=2.0\n",
    )
    .unwrap();

    let deps = project_dependencies(dir.path());
    assert_eq!(deps, vec!["requests==2.31.0", "flask>=2.0"]);
}

#[test]
fn test_cargo_toml_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Cargo.toml"),
        "[package]\nname = \"demo\"\n\n[dependencies]\nserde = \"1.0\"\ntokio = { version = \"1\" }\n\n[dev-dependencies]\ntempfile = \"3\"\n",
    )
    .unwrap();

    let deps = project_dependencies(dir.path());
    assert!(deps.contains(&"serde = \"1.0\"".to_string()));
    assert!(deps.iter().any(|d| d.starts_with("tokio = ")));
    assert!(!deps.iter().any(|d| d.contains("tempfile")));
}

#[test]
fn test_gemfile_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Gemfile"),
        "source 'https://rubygems.org'\ngem 'rails', '7.0.4'\ngem 'puma'\n",
    )
    .unwrap();

    let deps = project_dependencies(dir.path());
    assert_eq!(deps, vec!["rails: 7.0.4", "puma"]);
}

#[test]
fn test_pom_and_gradle_manifests() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("pom.xml"),
        "<project><dependencies><dependency><groupId>junit</groupId><artifactId>junit</artifactId><version>4.13</version></dependency></dependencies></project>",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("build.gradle"),
        "dependencies {\n    implementation 'com.google.guava:guava:31.1-jre'\n}\n",
    )
    .unwrap();

    let deps = project_dependencies(dir.path());
    assert!(deps.contains(&"junit:junit:4.13".to_string()));
    assert!(deps.contains(&"com.google.guava:guava:31.1-jre".to_string()));
}

#[test]
fn test_go_mod_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("go.mod"),
        "module demo\n\ngo 1.21\n\nrequire (\n\tgithub.com/google/uuid v1.3.0\n\tgithub.com/labstack/echo/v4 v4.11.1\n)\n",
    )
    .unwrap();

    let deps = project_dependencies(dir.path());
    assert_eq!(
        deps,
        vec![
            "github.com/google/uuid v1.3.0",
            "github.com/labstack/echo/v4 v4.11.1"
        ]
    );
}
