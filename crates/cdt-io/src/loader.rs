use std::path::{Path, PathBuf};

use cdt_core::errors::{CdtError, ErrorInfo};
use cdt_core::{RawRunMatrix, RunParameters};
use csv::{ReaderBuilder, StringRecord, Trim};

/// Location of the data file belonging to a run record: `<dir>/<name>.csv`.
pub fn data_path(dir: &Path, params: &RunParameters) -> PathBuf {
    dir.join(format!("{}.csv", params.name))
}

fn not_found(path: &Path) -> CdtError {
    CdtError::NotFound(
        ErrorInfo::new("data-file", "data file does not exist").with_context("path", path.display()),
    )
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> CdtError {
    CdtError::Parse(
        ErrorInfo::new("data-row", message)
            .with_context("path", path.display())
            .with_context("line", line),
    )
}

fn records(path: &Path) -> Result<Vec<StringRecord>, CdtError> {
    if !path.is_file() {
        return Err(not_found(path));
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|err| {
            CdtError::Parse(
                ErrorInfo::new("data-open", "failed to open data file")
                    .with_context("path", path.display())
                    .with_hint(err.to_string()),
            )
        })?;
    reader
        .records()
        .enumerate()
        .map(|(idx, record)| record.map_err(|err| parse_error(path, idx + 1, err.to_string())))
        .collect()
}

/// Fields of a record with the trailing empty ones (from a trailing comma) removed.
fn fields(record: &StringRecord) -> Vec<&str> {
    let mut fields: Vec<&str> = record.iter().collect();
    while fields.last().is_some_and(|field| field.is_empty()) {
        fields.pop();
    }
    fields
}

/// Reads a comma-delimited matrix of slice lengths, one sweep per line.
///
/// With `columns` set only the first `columns` fields of each line are kept
/// and shorter lines are rejected.
pub fn load_matrix(path: &Path, columns: Option<usize>) -> Result<RawRunMatrix, CdtError> {
    let mut rows = Vec::new();
    for (idx, record) in records(path)?.iter().enumerate() {
        let mut fields = fields(record);
        if fields.is_empty() {
            continue;
        }
        if let Some(columns) = columns {
            if fields.len() < columns {
                return Err(parse_error(path, idx + 1, "line has fewer fields than requested")
                    .with_context("fields", fields.len())
                    .with_context("columns", columns));
            }
            fields.truncate(columns);
        }
        let row = fields
            .iter()
            .map(|field| {
                field.parse::<u32>().map_err(|err| {
                    parse_error(path, idx + 1, err.to_string()).with_context("field", field)
                })
            })
            .collect::<Result<Vec<u32>, CdtError>>()?;
        rows.push(row);
    }
    RawRunMatrix::from_rows(rows).map_err(|err| err.with_context("path", path.display()))
}

/// Reads the first column of a delimited file as a scalar series.
pub fn load_series(path: &Path) -> Result<Vec<f64>, CdtError> {
    let mut series = Vec::new();
    for (idx, record) in records(path)?.iter().enumerate() {
        let Some(first) = fields(record).first().copied() else {
            continue;
        };
        let value = first.parse::<f64>().map_err(|err| {
            parse_error(path, idx + 1, err.to_string()).with_context("field", first)
        })?;
        series.push(value);
    }
    if series.is_empty() {
        return Err(CdtError::Shape(
            ErrorInfo::new("empty-series", "data file holds no samples")
                .with_context("path", path.display()),
        ));
    }
    Ok(series)
}
