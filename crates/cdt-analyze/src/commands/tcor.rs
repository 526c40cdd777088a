use std::error::Error;

use cdt_core::CdtError;
use cdt_stats::{
    autocovariance, batch_estimate, correlation_time, first_crossing, fit_correlation_time,
    reduce, AutocovMode, BatchedEstimate, CorrelationFit, LagSampling, ReductionRule,
};
use clap::Args;
use serde::Serialize;

use super::{analyse_runs, finish, load_config, load_run_matrix, select_runs, CommonArgs, RunOutcome};

#[derive(Args, Debug)]
pub struct TcorArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Serialize)]
struct TcorRun {
    samples: usize,
    max_lag: usize,
    first_crossing: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    fit: Option<CorrelationFit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fit_error: Option<CdtError>,
    batched: BatchedEstimate,
}

#[derive(Debug, Serialize)]
struct TcorReport {
    command: &'static str,
    batch_count: usize,
    runs: Vec<RunOutcome<TcorRun>>,
}

pub fn run(args: &TcorArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.common.config.as_deref())?;
    let opts = config.fit_opts();
    let entries = select_runs(&args.common)?;
    let runs = analyse_runs(&entries, &config, |params| -> Result<TcorRun, CdtError> {
        let matrix = load_run_matrix(&args.common.data, params, &config)?;
        let series = reduce(&matrix, ReductionRule::StdDev)?;
        let max_lag = config
            .max_lag
            .unwrap_or(series.len() / 2)
            .clamp(1, series.len());
        let sampling = config
            .resolution
            .map_or(LagSampling::Full, LagSampling::Resolution);
        let profile =
            autocovariance(&series, max_lag, AutocovMode::Biased, sampling)?.autocorrelation()?;
        let crossing = first_crossing(&profile)?;
        let (fit, fit_error) = match fit_correlation_time(&profile, &opts) {
            Ok(fit) => (Some(fit), None),
            Err(err) => (None, Some(err)),
        };
        let batched = batch_estimate(&series, config.batch_count, |batch| {
            correlation_time(batch).map(|lag| lag as f64)
        })?;
        Ok(TcorRun {
            samples: series.len(),
            max_lag,
            first_crossing: crossing,
            fit,
            fit_error,
            batched,
        })
    })?;

    finish(
        &args.common.out,
        TcorReport {
            command: "tcor",
            batch_count: config.batch_count,
            runs,
        },
    )
}
