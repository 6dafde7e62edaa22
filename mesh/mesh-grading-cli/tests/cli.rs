//! End-to-end tests of the hrtf-mesh-grading binary.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::process::{Command, Output};

use mesh_types::primitives;
use tempfile::TempDir;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hrtf-mesh-grading"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to launch binary")
}

fn write_sphere(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    mesh_io::save_mesh(&primitives::icosphere(60.0, 2), &path).unwrap();
    path.display().to_string()
}

#[test]
fn grades_and_writes_output() {
    let dir = TempDir::new().unwrap();
    let input = write_sphere(dir.path(), "head.stl");
    let output = dir.path().join("graded.ply");
    let output_str = output.display().to_string();

    let result = run(&[
        "-x", "2", "-y", "8", "-e", "0.2", "-z", "left", "-i", &input, "-o", &output_str,
        "--iterations", "3",
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let graded = mesh_io::load_mesh(&output).unwrap();
    assert!(!graded.faces.is_empty());
}

#[test]
fn json_report_lists_landmarks() {
    let dir = TempDir::new().unwrap();
    let input = write_sphere(dir.path(), "head.obj");
    let output = dir.path().join("graded.obj").display().to_string();

    let result = run(&[
        "-x", "2", "-y", "8", "-z", "right", "--mode", "distance", "--iterations", "2",
        "--right-ear", "55,0,0", "--format", "json", "-i", &input, "-o", &output,
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let json: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["report"]["side"], "right");
    assert_eq!(json["report"]["landmarks"]["right_explicit"], true);
    assert_eq!(json["config"]["mode"], "distance");
}

#[test]
fn config_file_is_overridden_by_flags() {
    let dir = TempDir::new().unwrap();
    let input = write_sphere(dir.path(), "head.ply");
    let output = dir.path().join("graded.stl").display().to_string();
    let config = dir.path().join("grading.json");
    std::fs::write(
        &config,
        r#"{"min_length": 2.0, "max_length": 8.0, "iterations": 5, "side": "left"}"#,
    )
    .unwrap();
    let config = config.display().to_string();

    let result = run(&[
        "--config", &config, "--iterations", "1", "--format", "json", "-i", &input, "-o", &output,
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let json: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    assert_eq!(json["config"]["iterations"], 1);
    assert_eq!(json["config"]["side"], "left");
    assert_eq!(json["report"]["iterations"].as_array().unwrap().len(), 1);
}

#[test]
fn inverted_range_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let input = write_sphere(dir.path(), "head.stl");
    let output = dir.path().join("graded.stl");
    let output_str = output.display().to_string();

    let result = run(&["-x", "5", "-y", "1", "-i", &input, "-o", &output_str]);
    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("min 5 > max 1"));
    assert!(!output.exists());
}

#[test]
fn missing_input_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("graded.stl").display().to_string();
    let result = run(&["-x", "1", "-y", "5", "-i", "/nonexistent/head.stl", "-o", &output]);
    assert_eq!(result.status.code(), Some(1));
}
