use std::error::Error;
use std::path::{Path, PathBuf};

use cdt_core::errors::{CdtError, ErrorInfo};
use cdt_core::{RawRunMatrix, RunParameters};
use cdt_io::{
    data_path, discover_runs, load_matrix, seal, write_report, AnalysisConfig, RunEntry, RunFilter,
};
use clap::Args;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub mod profile;
pub mod slices;
pub mod tcor;
pub mod teq;

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Directory holding `<name>.json` run records and `<name>.csv` data files.
    #[arg(long)]
    pub data: PathBuf,
    /// Path of the JSON report to write.
    #[arg(long)]
    pub out: PathBuf,
    /// Optional YAML analysis configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Only analyse runs with this many time-slices.
    #[arg(long)]
    pub timespan: Option<usize>,
    /// Only analyse runs with this slice length.
    #[arg(long)]
    pub length: Option<usize>,
    /// Only analyse runs with at least this many time-slices.
    #[arg(long)]
    pub min_timespan: Option<usize>,
    /// Only analyse runs flagged as measurements.
    #[arg(long)]
    pub measurements_only: bool,
}

impl CommonArgs {
    fn filter(&self) -> RunFilter {
        RunFilter {
            timespan: self.timespan,
            length: self.length,
            min_timespan: self.min_timespan,
            measurement: self.measurements_only.then_some(true),
        }
    }
}

/// Outcome state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    /// Analysis produced a result.
    Complete,
    /// Analysis failed; the error is attached.
    Failed,
}

/// Per-run entry of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome<T> {
    pub name: String,
    pub length: usize,
    pub timespan: usize,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CdtError>,
}

impl<T> RunOutcome<T> {
    fn from_result(params: &RunParameters, result: Result<T, CdtError>) -> Self {
        let (state, result, error) = match result {
            Ok(value) => (RunState::Complete, Some(value), None),
            Err(err) => {
                warn!(run = %params.name, error = %err, "run analysis failed");
                (RunState::Failed, None, Some(err))
            }
        };
        Self {
            name: params.name.clone(),
            length: params.length,
            timespan: params.timespan,
            state,
            result,
            error,
        }
    }
}

/// Loads the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, CdtError> {
    match path {
        Some(path) => AnalysisConfig::from_path(path),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Discovers and filters the runs selected by the shared flags.
pub fn select_runs(args: &CommonArgs) -> Result<Vec<RunEntry>, CdtError> {
    let runs = args.filter().apply(discover_runs(&args.data)?);
    info!(dir = %args.data.display(), runs = runs.len(), "selected runs");
    Ok(runs)
}

/// Loads the slice-length matrix of a run, keeping `timespan` columns and
/// dropping the configured burn-in sweeps.
pub fn load_run_matrix(
    dir: &Path,
    params: &RunParameters,
    config: &AnalysisConfig,
) -> Result<RawRunMatrix, CdtError> {
    let matrix = load_matrix(&data_path(dir, params), Some(params.timespan))?;
    if config.discard == 0 {
        return Ok(matrix);
    }
    matrix.discard(config.discard)
}

/// Runs `analyse` over every entry on a pool sized by `config.concurrency`.
///
/// Failures are captured per run; the outcomes keep the input order.
pub fn analyse_runs<T, F>(
    runs: &[RunEntry],
    config: &AnalysisConfig,
    analyse: F,
) -> Result<Vec<RunOutcome<T>>, CdtError>
where
    T: Send,
    F: Fn(&RunParameters) -> Result<T, CdtError> + Sync + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.concurrency)
        .build()
        .map_err(|err| {
            CdtError::Range(
                ErrorInfo::new("thread-pool", "failed to build worker pool")
                    .with_context("concurrency", config.concurrency)
                    .with_hint(err.to_string()),
            )
        })?;
    let mut ordered: Vec<(usize, RunOutcome<T>)> = pool.install(|| {
        runs.par_iter()
            .enumerate()
            .map(|(index, entry)| {
                let outcome = RunOutcome::from_result(&entry.params, analyse(&entry.params));
                (index, outcome)
            })
            .collect()
    });
    ordered.sort_by_key(|(index, _)| *index);
    Ok(ordered.into_iter().map(|(_, outcome)| outcome).collect())
}

/// Seals and writes a report, printing its hash.
pub fn finish<T: Serialize>(out: &Path, report: T) -> Result<(), Box<dyn Error>> {
    let sealed = seal(report)?;
    write_report(out, &sealed)?;
    println!("{} {}", sealed.report_hash, out.display());
    Ok(())
}
