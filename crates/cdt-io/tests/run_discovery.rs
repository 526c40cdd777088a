use std::fs;

use cdt_core::CdtError;
use cdt_io::{
    data_path, discover_runs, load_matrix, load_series, seal, write_report, RunFilter,
};
use serde_json::json;
use tempfile::tempdir;

fn record(name: &str, length: usize, timespan: usize, measurement: bool) -> String {
    format!(
        r#"{{"name": "{name}", "is_measurement": {measurement}, "timespan": {timespan}, "length": {length}, "move_ratio": 0.1, "n_save": 100, "pause": 50}}"#
    )
}

#[test]
fn records_are_sorted_and_filtered() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("b.json"), record("run-b", 20, 400, true)).expect("write");
    fs::write(dir.path().join("a.json"), record("run-a", 40, 100, true)).expect("write");
    fs::write(dir.path().join("c.json"), record("run-c", 20, 400, false)).expect("write");
    fs::write(dir.path().join("run-a.csv"), "1,2\n").expect("write");
    fs::create_dir(dir.path().join("nested")).expect("mkdir");
    fs::write(dir.path().join("nested/d.json"), record("run-d", 1, 1, true)).expect("write");

    let runs = discover_runs(dir.path()).expect("discover");
    let names: Vec<_> = runs.iter().map(|run| run.params.name.as_str()).collect();
    assert_eq!(names, vec!["run-a", "run-b", "run-c"]);
    assert_eq!(runs[1].params.triangle_count(), 16_000);

    let filter = RunFilter {
        min_timespan: Some(200),
        measurement: Some(true),
        ..RunFilter::default()
    };
    let kept = filter.apply(runs);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].params.name, "run-b");
    assert_eq!(
        data_path(dir.path(), &kept[0].params),
        dir.path().join("run-b.csv")
    );
}

#[test]
fn foreign_json_files_are_skipped() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("run-a.json"), record("run-a", 10, 20, true)).expect("write");
    fs::write(dir.path().join("bad.json"), "{ not json").expect("write");
    let sealed = seal(json!({"runs": []})).expect("seal");
    write_report(&dir.path().join("tcor.json"), &sealed).expect("report");

    let runs = discover_runs(dir.path()).expect("discover");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].params.name, "run-a");

    let missing = discover_runs(&dir.path().join("absent")).unwrap_err();
    assert!(matches!(missing, CdtError::NotFound(_)));
}

#[test]
fn invalid_ratio_is_rejected_on_discovery() {
    let dir = tempdir().expect("tempdir");
    let text = record("run", 10, 10, true).replace("0.1", "1.5");
    fs::write(dir.path().join("run.json"), text).expect("write");
    let err = discover_runs(dir.path()).unwrap_err();
    assert_eq!(err.info().code, "move-ratio");
}

#[test]
fn matrix_loader_handles_trailing_commas_and_columns() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("lengths.csv");
    fs::write(&path, "10, 12, 14, 99,\n11,13,13,98,\n").expect("write");
    let full = load_matrix(&path, None).expect("matrix");
    assert_eq!(full.n_samples(), 2);
    assert_eq!(full.n_slices(), 4);
    let trimmed = load_matrix(&path, Some(3)).expect("matrix");
    assert_eq!(trimmed.row(1), &[11, 13, 13]);

    let err = load_matrix(&path, Some(6)).unwrap_err();
    assert!(matches!(err, CdtError::Parse(_)));
}

#[test]
fn loader_errors_are_typed() {
    let dir = tempdir().expect("tempdir");
    let missing = load_matrix(&dir.path().join("absent.csv"), None).unwrap_err();
    assert!(matches!(missing, CdtError::NotFound(_)));

    let path = dir.path().join("broken.csv");
    fs::write(&path, "1,2\n3,x\n").expect("write");
    let err = load_matrix(&path, None).unwrap_err();
    assert!(matches!(err, CdtError::Parse(_)));
    assert_eq!(err.info().context.get("line").map(String::as_str), Some("2"));

    let ragged = dir.path().join("ragged.csv");
    fs::write(&ragged, "1,2,3\n4,5\n").expect("write");
    assert!(matches!(load_matrix(&ragged, None).unwrap_err(), CdtError::Shape(_)));
}

#[test]
fn series_reads_first_column() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("std.csv");
    fs::write(&path, "0.5,7\n1.25,8\n2.0,9\n").expect("write");
    assert_eq!(load_series(&path).expect("series"), vec![0.5, 1.25, 2.0]);
}
