use std::fs;
use std::path::{Path, PathBuf};

use cdt_core::errors::{CdtError, ErrorInfo};
use cdt_core::RunParameters;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::serde::from_json_slice;

/// A parameter record together with the file it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    /// Path of the `.json` record.
    pub path: PathBuf,
    /// Parsed and validated parameters.
    pub params: RunParameters,
}

/// Selection of runs by lattice geometry and run kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFilter {
    /// Keep only runs with exactly this many time-slices.
    #[serde(default)]
    pub timespan: Option<usize>,
    /// Keep only runs with exactly this slice length.
    #[serde(default)]
    pub length: Option<usize>,
    /// Keep only runs with at least this many time-slices.
    #[serde(default)]
    pub min_timespan: Option<usize>,
    /// Keep only measurement (or only test) runs.
    #[serde(default)]
    pub measurement: Option<bool>,
}

impl RunFilter {
    /// Whether `params` passes every configured criterion.
    pub fn matches(&self, params: &RunParameters) -> bool {
        self.timespan.map_or(true, |t| params.timespan == t)
            && self.length.map_or(true, |l| params.length == l)
            && self.min_timespan.map_or(true, |t| params.timespan >= t)
            && self.measurement.map_or(true, |m| params.is_measurement == m)
    }

    /// Retains the matching entries in their original order.
    pub fn apply(&self, entries: Vec<RunEntry>) -> Vec<RunEntry> {
        entries
            .into_iter()
            .filter(|entry| self.matches(&entry.params))
            .collect()
    }
}

/// Reads every `*.json` record directly inside `dir`, sorted by run name.
///
/// JSON files that do not parse as a run record (reports written next to the
/// data, say) are skipped with a warning. Records that parse but fail
/// validation are errors.
pub fn discover_runs(dir: &Path) -> Result<Vec<RunEntry>, CdtError> {
    if !dir.is_dir() {
        return Err(CdtError::NotFound(
            ErrorInfo::new("run-directory", "run directory does not exist")
                .with_context("path", dir.display()),
        ));
    }
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        if let Some(record) = read_record(path)? {
            entries.push(record);
        }
    }
    entries.sort_by(|a, b| a.params.name.cmp(&b.params.name).then_with(|| a.path.cmp(&b.path)));
    debug!(dir = %dir.display(), runs = entries.len(), "discovered run records");
    Ok(entries)
}

fn read_record(path: &Path) -> Result<Option<RunEntry>, CdtError> {
    let bytes = fs::read(path).map_err(|err| {
        CdtError::NotFound(
            ErrorInfo::new("run-record", "failed to read run record")
                .with_context("path", path.display())
                .with_hint(err.to_string()),
        )
    })?;
    let params: RunParameters = match from_json_slice(&bytes) {
        Ok(params) => params,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping json file that is not a run record");
            return Ok(None);
        }
    };
    params
        .validate()
        .map_err(|err| err.with_context("path", path.display()))?;
    Ok(Some(RunEntry {
        path: path.to_path_buf(),
        params,
    }))
}
