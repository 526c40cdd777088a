use std::error::Error;

use cdt_core::{CdtError, FitResult};
use cdt_stats::{
    batch_estimate, cosmological_constant, fit_power_law_origin, reduce, BatchedEstimate, FitOpts,
    PowerLawFit, ReductionRule,
};
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::{
    analyse_runs, finish, load_config, load_run_matrix, select_runs, CommonArgs, RunOutcome,
    RunState,
};

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Serialize)]
struct ProfileRun {
    samples: usize,
    width: BatchedEstimate,
    cosmological_constant: FitResult,
}

/// A scaling fit across system sizes, or the reason it could not be made.
#[derive(Debug, Serialize)]
struct Scaling {
    #[serde(skip_serializing_if = "Option::is_none")]
    fit: Option<PowerLawFit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CdtError>,
}

impl From<Result<PowerLawFit, CdtError>> for Scaling {
    fn from(result: Result<PowerLawFit, CdtError>) -> Self {
        match result {
            Ok(fit) => Self {
                fit: Some(fit),
                error: None,
            },
            Err(err) => Self {
                fit: None,
                error: Some(err),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ProfileReport {
    command: &'static str,
    batch_count: usize,
    runs: Vec<RunOutcome<ProfileRun>>,
    width_scaling: Scaling,
    lambda_scaling: Scaling,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn run(args: &ProfileArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.common.config.as_deref())?;
    let opts = config.fit_opts();
    let entries = select_runs(&args.common)?;
    let runs = analyse_runs(&entries, &config, |params| -> Result<ProfileRun, CdtError> {
        let matrix = load_run_matrix(&args.common.data, params, &config)?;
        let widths = reduce(&matrix, ReductionRule::StdDev)?;
        let width = batch_estimate(&widths, config.batch_count, |batch| Ok(mean(batch)))?;
        let lambda = cosmological_constant(width.result())?;
        info!(
            run = %params.name,
            width = width.mean,
            lambda = lambda.estimate,
            "slice-length width"
        );
        Ok(ProfileRun {
            samples: widths.len(),
            width,
            cosmological_constant: lambda,
        })
    })?;

    let mut lengths = Vec::new();
    let mut widths = Vec::new();
    let mut width_errors = Vec::new();
    let mut lambdas = Vec::new();
    for outcome in &runs {
        if let (RunState::Complete, Some(run)) = (outcome.state, &outcome.result) {
            lengths.push(outcome.length as f64);
            widths.push(run.width.mean);
            width_errors.push(run.width.stderr);
            lambdas.push(run.cosmological_constant.estimate);
        }
    }
    let weighted = FitOpts {
        absolute_sigma: true,
        ..opts.clone()
    };
    let width_scaling: Scaling =
        fit_power_law_origin(&lengths, &widths, Some(&width_errors), &weighted).into();
    let lambda_scaling: Scaling = fit_power_law_origin(&lengths, &lambdas, None, &opts).into();

    finish(
        &args.common.out,
        ProfileReport {
            command: "profile",
            batch_count: config.batch_count,
            runs,
            width_scaling,
            lambda_scaling,
        },
    )
}
