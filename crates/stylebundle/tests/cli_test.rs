/*
 * cli_test.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests of the stylebundle binary.
 */

use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn stylebundle() -> Command {
    Command::new(env!("CARGO_BIN_EXE_stylebundle"))
}

#[test]
fn test_build_writes_bundles() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let dir = temp.path();
    fs::write(dir.join("index.scss"), "@import 'a';\n.index { color: red; }\n").unwrap();
    fs::write(dir.join("_a.scss"), ".a { color: blue; }\n").unwrap();

    let output = stylebundle()
        .current_dir(dir)
        .args(["build", "index.scss", "--out-dir", "out"])
        .output()
        .expect("Failed to execute command");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let css = fs::read_to_string(dir.join("out/index.css")).unwrap();
    assert!(css.find(".a {").unwrap() < css.find(".index {").unwrap());
    assert!(dir.join("out/index.css.map").is_file());
}

#[test]
fn test_dry_run_prints_outline() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let dir = temp.path();
    fs::write(dir.join("index.css"), ".a { color: red; }\n").unwrap();

    let output = stylebundle()
        .current_dir(dir)
        .args(["build", "index.css", "--dry-run", "--no-source-maps"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "stylesheet index.css [index.css]\n");
    assert!(!dir.join("dist").exists());
}

#[test]
fn test_json_summary() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let dir = temp.path();
    fs::write(dir.join("index.css"), ".a { color: red; }\n").unwrap();

    let output = stylebundle()
        .current_dir(dir)
        .args(["build", "index.css", "--json", "-t", "minify"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["compiles"], 1);
    assert_eq!(summary["bundles"][0]["type"], "stylesheet");
    assert_eq!(summary["bundles"][0]["name"], "index.css");
    assert_eq!(fs::read_to_string(dir.join("dist/index.css")).unwrap(), ".a{color: red}");
}

#[test]
fn test_import_cycle_fails_without_output() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let dir = temp.path();
    fs::write(dir.join("a.scss"), "@import 'b';\n").unwrap();
    fs::write(dir.join("b.scss"), "@import 'a';\n").unwrap();

    let output = stylebundle()
        .current_dir(dir)
        .args(["build", "a.scss"])
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Import cycle detected"), "stderr: {stderr}");
    assert!(!dir.join("dist").exists());
}

#[test]
fn test_missing_entry() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let output = stylebundle()
        .current_dir(temp.path())
        .args(["build", "nope.scss"])
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}
