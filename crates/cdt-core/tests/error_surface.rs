use cdt_core::errors::{CdtError, ErrorInfo};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("lag", 12)
        .with_context("reason", "ragged")
}

#[test]
fn shape_error_surface() {
    let err = CdtError::Shape(sample_info("zero-variance", "constant series"));
    assert_eq!(err.info().code, "zero-variance");
    assert!(err.info().context.contains_key("lag"));
}

#[test]
fn range_error_surface() {
    let err = CdtError::range("max-lag", "lag out of range").with_context("max_lag", 0);
    assert!(matches!(err, CdtError::Range(_)));
    assert_eq!(err.info().context.get("max_lag").map(String::as_str), Some("0"));
}

#[test]
fn fit_error_carries_hint() {
    let err = CdtError::fit("max-iterations", "solver did not converge")
        .with_hint("provide an initial guess");
    assert_eq!(err.info().hint.as_deref(), Some("provide an initial guess"));
    let rendered = err.to_string();
    assert!(rendered.starts_with("fit convergence error"));
    assert!(rendered.contains("hint: provide an initial guess"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = CdtError::Parse(sample_info("csv-field", "not an integer"));
    let json = serde_json::to_value(&err).expect("serialize");
    assert_eq!(json["family"], "Parse");
    assert_eq!(json["detail"]["code"], "csv-field");
    let decoded: CdtError = serde_json::from_value(json).expect("deserialize");
    assert_eq!(decoded, err);
}
