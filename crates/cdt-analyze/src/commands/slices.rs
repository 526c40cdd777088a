use std::error::Error;

use cdt_core::CdtError;
use cdt_stats::{
    batch_profile, first_crossing, mean_slice_autocorrelation, slice_autocovariance,
    AutocorrelationProfile, BatchedProfile,
};
use clap::Args;
use serde::Serialize;

use super::{analyse_runs, finish, load_config, load_run_matrix, select_runs, CommonArgs, RunOutcome};

#[derive(Args, Debug)]
pub struct SlicesArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Serialize)]
struct SlicesRun {
    samples: usize,
    correlation: AutocorrelationProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_length: Option<usize>,
    covariance: BatchedProfile,
}

#[derive(Debug, Serialize)]
struct SlicesReport {
    command: &'static str,
    batch_count: usize,
    runs: Vec<RunOutcome<SlicesRun>>,
}

pub fn run(args: &SlicesArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.common.config.as_deref())?;
    let entries = select_runs(&args.common)?;
    let runs = analyse_runs(&entries, &config, |params| -> Result<SlicesRun, CdtError> {
        let matrix = load_run_matrix(&args.common.data, params, &config)?;
        let max_lag = config
            .max_lag
            .unwrap_or(matrix.n_slices() / 2)
            .clamp(1, matrix.n_slices());
        let correlation = mean_slice_autocorrelation(&matrix, max_lag)?;
        let rows: Vec<Vec<f64>> = slice_autocovariance(&matrix, max_lag)?
            .into_iter()
            .map(|profile| profile.values)
            .collect();
        let covariance = batch_profile(&rows, config.batch_count)?;
        Ok(SlicesRun {
            samples: matrix.n_samples(),
            correlation_length: first_crossing(&correlation).ok(),
            correlation,
            covariance,
        })
    })?;

    finish(
        &args.common.out,
        SlicesReport {
            command: "slices",
            batch_count: config.batch_count,
            runs,
        },
    )
}
