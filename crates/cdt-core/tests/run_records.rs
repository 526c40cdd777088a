use cdt_core::{CdtError, RawRunMatrix, RunParameters};

#[test]
fn simulator_record_parses() {
    let json = r#"{"name":"meas_t20_l100_n5000_r0.3_1639847975","is_measurement":true,
        "timespan":20,"length":100,"move_ratio":0.3,"n_save":5000,"pause":4000,
        "move_ratio_eq":0.5,"eq_sweeps":10}"#;
    let params: RunParameters = serde_json::from_str(json).expect("record");
    assert_eq!(params.timespan, 20);
    assert_eq!(params.triangle_count(), 4000);
    assert_eq!(params.move_ratio_eq, Some(0.5));
    params.validate().expect("valid");
}

#[test]
fn minimal_record_uses_defaults() {
    let json = r#"{"name":"run","timespan":30,"length":20,"move_ratio":0.4}"#;
    let params: RunParameters = serde_json::from_str(json).expect("record");
    assert!(!params.is_measurement);
    assert_eq!(params.n_save, 0);
    assert_eq!(params.move_ratio_eq, None);
}

#[test]
fn move_ratio_outside_unit_interval_rejected() {
    let json = r#"{"name":"bad","timespan":30,"length":20,"move_ratio":1.5}"#;
    let params: RunParameters = serde_json::from_str(json).expect("record");
    let err = params.validate().expect_err("invalid ratio");
    assert!(matches!(err, CdtError::Range(_)));
}

#[test]
fn matrix_rejects_empty_and_ragged_input() {
    assert!(matches!(
        RawRunMatrix::from_rows(Vec::new()),
        Err(CdtError::Shape(_))
    ));
    assert!(matches!(
        RawRunMatrix::from_rows(vec![Vec::new()]),
        Err(CdtError::Shape(_))
    ));
    let err = RawRunMatrix::from_rows(vec![vec![1, 2], vec![3]]).expect_err("ragged");
    assert_eq!(err.info().code, "ragged-rows");
}

#[test]
fn discard_drops_leading_rows() {
    let matrix = RawRunMatrix::from_rows(vec![vec![1, 2], vec![3, 4], vec![5, 6]]).unwrap();
    let trimmed = matrix.discard(2).expect("trim");
    assert_eq!(trimmed.n_samples(), 1);
    assert_eq!(trimmed.row(0), &[5, 6]);
    assert!(matches!(matrix.discard(3), Err(CdtError::Range(_))));
    assert_eq!(matrix.rows().len(), 3);
    assert!((matrix.grand_mean() - 3.5).abs() < 1e-12);
}

#[test]
fn deserialized_matrix_is_validated() {
    let empty = r#"{"n_samples": 0, "n_slices": 0, "values": []}"#;
    let err = serde_json::from_str::<RawRunMatrix>(empty).expect_err("empty matrix");
    assert!(err.to_string().contains("empty-matrix"));

    let short = r#"{"n_samples": 5, "n_slices": 2, "values": [1, 2, 3]}"#;
    let err = serde_json::from_str::<RawRunMatrix>(short).expect_err("short buffer");
    assert!(err.to_string().contains("buffer-size"));

    let matrix = RawRunMatrix::from_rows(vec![vec![1, 2], vec![3, 4]]).expect("matrix");
    let json = serde_json::to_string(&matrix).expect("serialize");
    let restored: RawRunMatrix = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(restored, matrix);
}
