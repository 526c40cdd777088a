use std::fs;

use cdt_core::CdtError;
use cdt_io::{seal, stable_hash_string, write_report, AnalysisConfig, SealedReport};
use serde_json::json;
use tempfile::tempdir;

#[test]
fn partial_yaml_keeps_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("analysis.yaml");
    fs::write(
        &path,
        "batch_count: 20\nmax_relative_error: 0.1\nfit:\n  max_iters: 50\n",
    )
    .expect("write");
    let config = AnalysisConfig::from_path(&path).expect("config");
    assert_eq!(config.batch_count, 20);
    assert_eq!(config.time_unit, 1.0);
    assert_eq!(config.fit.max_iters, 50);
    assert_eq!(config.fit.xtol, 1e-10);
    assert_eq!(config.fit_opts().max_relative_error, Some(0.1));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("analysis.yaml");
    fs::write(&path, "batch_count: 1\n").expect("write");
    let err = AnalysisConfig::from_path(&path).unwrap_err();
    assert_eq!(err.info().code, "batch-count");

    fs::write(&path, "batch_count: [1, 2]\n").expect("write");
    assert!(matches!(
        AnalysisConfig::from_path(&path).unwrap_err(),
        CdtError::Serde(_)
    ));
}

#[test]
fn sealed_report_hash_ignores_key_order() {
    let first = json!({"runs": [1, 2], "command": "tcor"});
    let second = json!({"command": "tcor", "runs": [1, 2]});
    assert_eq!(
        stable_hash_string(&first).expect("hash"),
        stable_hash_string(&second).expect("hash")
    );

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("out/report.json");
    let sealed = seal(first).expect("seal");
    write_report(&path, &sealed).expect("write");
    let bytes = fs::read(&path).expect("read");
    let restored: SealedReport<serde_json::Value> = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(restored, sealed);
    assert_eq!(restored.report_hash.len(), 64);
}
