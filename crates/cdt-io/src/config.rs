use std::fs;
use std::path::Path;

use cdt_core::errors::{CdtError, ErrorInfo};
use cdt_stats::FitOpts;
use serde::{Deserialize, Serialize};

use crate::serde::from_yaml_slice;

fn default_batch_count() -> usize {
    10
}

fn default_time_unit() -> f64 {
    1.0
}

/// Tunables shared by every analysis subcommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Leading sweeps dropped from every run before analysis.
    #[serde(default)]
    pub discard: usize,
    /// Number of batches for error estimation.
    #[serde(default = "default_batch_count")]
    pub batch_count: usize,
    /// Number of sampled lags for autocorrelation profiles; all lags when unset.
    #[serde(default)]
    pub resolution: Option<usize>,
    /// Upper lag for autocorrelation profiles; half the series when unset.
    #[serde(default)]
    pub max_lag: Option<usize>,
    /// Reject fits whose relative error exceeds this threshold.
    #[serde(default)]
    pub max_relative_error: Option<f64>,
    /// Time between consecutive samples of an equilibration series, in sweeps.
    #[serde(default = "default_time_unit")]
    pub time_unit: f64,
    /// Worker threads; zero lets rayon decide.
    #[serde(default)]
    pub concurrency: usize,
    /// Solver settings.
    #[serde(default)]
    pub fit: FitOpts,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            discard: 0,
            batch_count: default_batch_count(),
            resolution: None,
            max_lag: None,
            max_relative_error: None,
            time_unit: default_time_unit(),
            concurrency: 0,
            fit: FitOpts::default(),
        }
    }
}

impl AnalysisConfig {
    /// Loads and validates a YAML configuration file.
    pub fn from_path(path: &Path) -> Result<Self, CdtError> {
        let bytes = fs::read(path).map_err(|err| {
            CdtError::NotFound(
                ErrorInfo::new("config-file", "failed to read configuration")
                    .with_context("path", path.display())
                    .with_hint(err.to_string()),
            )
        })?;
        let config: Self =
            from_yaml_slice(&bytes).map_err(|err| err.with_context("path", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the fields that have a restricted domain.
    pub fn validate(&self) -> Result<(), CdtError> {
        if self.batch_count < 2 {
            return Err(config_error("batch-count", "batch_count must be at least 2")
                .with_context("batch_count", self.batch_count));
        }
        if !(self.time_unit > 0.0 && self.time_unit.is_finite()) {
            return Err(config_error("time-unit", "time_unit must be positive")
                .with_context("time_unit", self.time_unit));
        }
        if self.resolution == Some(0) {
            return Err(config_error("resolution", "resolution must be positive"));
        }
        if let Some(threshold) = self.max_relative_error {
            if threshold.is_nan() || threshold <= 0.0 {
                return Err(config_error("max-relative-error", "threshold must be positive")
                    .with_context("max_relative_error", threshold));
            }
        }
        Ok(())
    }

    /// Solver options with the configured relative-error threshold applied.
    pub fn fit_opts(&self) -> FitOpts {
        match self.max_relative_error {
            Some(threshold) => self.fit.clone().with_max_relative_error(threshold),
            None => self.fit.clone(),
        }
    }
}

fn config_error(code: &str, message: &str) -> CdtError {
    CdtError::Range(ErrorInfo::new(code, message))
}
