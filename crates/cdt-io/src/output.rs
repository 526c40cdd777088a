use std::fs;
use std::path::Path;

use cdt_core::errors::{CdtError, ErrorInfo};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::hash::stable_hash_string;
use crate::serde::to_canonical_json_bytes;

/// Report payload paired with the SHA256 of its canonical JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedReport<T> {
    /// Hex digest over the canonical bytes of `report`.
    pub report_hash: String,
    /// Analysis output.
    pub report: T,
}

/// Hashes `report` and wraps it for writing.
pub fn seal<T: Serialize>(report: T) -> Result<SealedReport<T>, CdtError> {
    let report_hash = stable_hash_string(&report)?;
    Ok(SealedReport {
        report_hash,
        report,
    })
}

/// Writes a sealed report as canonical JSON, creating parent directories.
pub fn write_report<T: Serialize>(path: &Path, sealed: &SealedReport<T>) -> Result<(), CdtError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| write_error(path, err))?;
    }
    let bytes = to_canonical_json_bytes(sealed)?;
    fs::write(path, bytes).map_err(|err| write_error(path, err))?;
    info!(path = %path.display(), hash = %sealed.report_hash, "report written");
    Ok(())
}

fn write_error(path: &Path, err: std::io::Error) -> CdtError {
    CdtError::Serde(
        ErrorInfo::new("report-write", "failed to write report")
            .with_context("path", path.display())
            .with_hint(err.to_string()),
    )
}
