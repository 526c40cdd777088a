use std::collections::BTreeMap;
use std::error::Error;

use cdt_core::CdtError;
use cdt_io::{data_path, load_series};
use cdt_stats::{batch_runs, fit_equilibration, BatchedEstimate, EquilibrationFit};
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::{analyse_runs, finish, load_config, select_runs, CommonArgs, RunOutcome, RunState};

#[derive(Args, Debug)]
pub struct TeqArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Batched equilibration time of the repeated runs at one system size.
#[derive(Debug, Serialize)]
struct SizeGroup {
    triangle_count: usize,
    runs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    t_eq: Option<BatchedEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CdtError>,
}

#[derive(Debug, Serialize)]
struct TeqReport {
    command: &'static str,
    time_unit: f64,
    runs: Vec<RunOutcome<EquilibrationFit>>,
    groups: Vec<SizeGroup>,
}

pub fn run(args: &TeqArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.common.config.as_deref())?;
    let opts = config.fit_opts();
    let entries = select_runs(&args.common)?;
    let runs = analyse_runs(&entries, &config, |params| {
        let series = load_series(&data_path(&args.common.data, params))?;
        fit_equilibration(&series, config.time_unit, &opts)
    })?;

    let mut sizes: BTreeMap<usize, Vec<(&str, f64)>> = BTreeMap::new();
    for (entry, outcome) in entries.iter().zip(&runs) {
        if let (RunState::Complete, Some(fit)) = (outcome.state, &outcome.result) {
            sizes
                .entry(entry.params.triangle_count())
                .or_default()
                .push((outcome.name.as_str(), fit.t_eq.estimate));
        }
    }
    let groups = sizes
        .into_iter()
        .map(|(triangle_count, members)| {
            let batched = batch_runs(&members, |&(_, t_eq)| Ok(t_eq));
            if let Ok(estimate) = &batched {
                info!(
                    triangle_count,
                    t_eq = estimate.mean,
                    stderr = estimate.stderr,
                    "equilibration time"
                );
            }
            let (t_eq, error) = match batched {
                Ok(estimate) => (Some(estimate), None),
                Err(err) => (None, Some(err)),
            };
            SizeGroup {
                triangle_count,
                runs: members.iter().map(|(name, _)| name.to_string()).collect(),
                t_eq,
                error,
            }
        })
        .collect();

    finish(
        &args.common.out,
        TeqReport {
            command: "teq",
            time_unit: config.time_unit,
            runs,
            groups,
        },
    )
}
