//! Tests that drive the `sdm` binary.

mod common;

use sdm_runner::{RunConfig, SUMMARY_FILE};
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn sdm(args: &[&str]) -> Output {
    // CARGO_BIN_EXE_sdm is set by cargo when running tests for this crate
    let binary = PathBuf::from(env!("CARGO_BIN_EXE_sdm"));
    Command::new(binary)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute sdm")
}

#[test]
fn test_config_prints_default() {
    let output = sdm(&["config"]);
    assert!(output.status.success());

    let yaml = String::from_utf8(output.stdout).unwrap();
    let config = RunConfig::from_yaml_str(&yaml).unwrap();
    assert_eq!(config, RunConfig::default());
}

#[test]
fn test_run_with_overrides() {
    let dir = TempDir::new().unwrap();
    let fixture = common::prepare(dir.path());
    let output_dir = dir.path().join("output");

    let output = sdm(&[
        "run",
        "--occurrences",
        fixture.occurrences.to_str().unwrap(),
        "--layers",
        fixture.current_dir.to_str().unwrap(),
        "--output",
        output_dir.to_str().unwrap(),
        "--background",
        "200",
        "--threshold",
        "no-omission",
        "--seed",
        "7",
        "--no-forecast",
    ]);
    assert!(
        output.status.success(),
        "sdm run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let text = std::fs::read_to_string(output_dir.join(SUMMARY_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["seed"], 7);
    assert_eq!(json["assembly"]["background_kept"], 200);
    assert_eq!(json["evaluation"]["criterion"], "no_omission");
    assert!(json["forecast"].is_null());
}

#[test]
fn test_run_with_config_file() {
    let dir = TempDir::new().unwrap();
    let fixture = common::prepare(dir.path());
    let config_path = dir.path().join("run.yaml");
    std::fs::write(
        &config_path,
        "occurrences: occurrences.csv\n\
         output_dir: results\n\
         layers:\n  current_dir: current\n  forecast_dir: forecast\n\
         background:\n  count: 250\n\
         folds: 4\n\
         test_fold: 2\n\
         forecast: {}\n",
    )
    .unwrap();
    assert!(fixture.occurrences.is_file());

    let output = sdm(&["run", "--config", config_path.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "sdm run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let results = dir.path().join("results");
    let text = std::fs::read_to_string(results.join(SUMMARY_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["folds"], 4);
    assert_eq!(json["test_fold"], 2);
    assert!(json["forecast"].is_object());
}

#[test]
fn test_run_reports_missing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.csv");
    let output = sdm(&[
        "run",
        "--occurrences",
        missing.to_str().unwrap(),
        "--layers",
        dir.path().to_str().unwrap(),
        "--no-forecast",
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_threshold_is_rejected() {
    let output = sdm(&["run", "--threshold", "best"]);
    assert!(!output.status.success());
}
