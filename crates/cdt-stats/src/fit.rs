use cdt_core::errors::{CdtError, ErrorInfo};
use cdt_core::FitResult;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::autocov::{mean, AutocorrelationProfile};
use crate::solver::{levenberg_marquardt, Model, Problem, Solution};

fn default_max_iters() -> usize {
    200
}

fn default_xtol() -> f64 {
    1e-10
}

fn default_ftol() -> f64 {
    1e-10
}

/// Solver configuration shared by every parametric fit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitOpts {
    /// Maximum number of accepted Levenberg-Marquardt iterations.
    #[serde(default = "default_max_iters")]
    pub max_iters: usize,
    /// Relative step size below which the solver stops.
    #[serde(default = "default_xtol")]
    pub xtol: f64,
    /// Relative reduction of the squared residuals below which the solver stops.
    #[serde(default = "default_ftol")]
    pub ftol: f64,
    /// Reject fits whose parameter of interest has `stderr / estimate` above this.
    #[serde(default)]
    pub max_relative_error: Option<f64>,
    /// Treat supplied sigmas as absolute (do not rescale by the reduced chi-square).
    #[serde(default)]
    pub absolute_sigma: bool,
    /// Starting point overriding the data-driven guess, in model parameter order.
    #[serde(default)]
    pub initial_guess: Option<Vec<f64>>,
}

impl Default for FitOpts {
    fn default() -> Self {
        Self {
            max_iters: default_max_iters(),
            xtol: default_xtol(),
            ftol: default_ftol(),
            max_relative_error: None,
            absolute_sigma: false,
            initial_guess: None,
        }
    }
}

impl FitOpts {
    /// Returns a copy rejecting fits above the given relative error.
    pub fn with_max_relative_error(mut self, threshold: f64) -> Self {
        self.max_relative_error = Some(threshold);
        self
    }
}

/// Fit quality information accompanying every estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Parameter names in covariance order.
    pub parameters: Vec<String>,
    /// Accepted solver iterations.
    pub iterations: usize,
    /// Weighted sum of squared residuals at the solution.
    pub sse: f64,
    /// Unweighted residuals `y - f(x)` at the solution.
    pub residuals: Vec<f64>,
    /// Parameter covariance matrix, row-major.
    pub covariance: Vec<Vec<f64>>,
}

impl FitDiagnostics {
    fn from_solution(model: &dyn Model, solution: &Solution) -> Self {
        let covariance = solution
            .covariance
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect();
        Self {
            parameters: model.names().iter().map(|name| name.to_string()).collect(),
            iterations: solution.iterations,
            sse: solution.sse,
            residuals: solution.residuals.clone(),
            covariance,
        }
    }
}

/// Result of the exponential-saturation fit `O_eq (1 - exp(-t / t_eq))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibrationFit {
    /// Equilibration time in units of `time_unit`.
    pub t_eq: FitResult,
    /// Saturation level of the observable.
    pub o_eq: FitResult,
    /// Solver diagnostics.
    pub diagnostics: FitDiagnostics,
}

/// Result of the exponential-decay fit `exp(-t / t_cor)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationFit {
    /// Correlation time in lags.
    pub t_cor: FitResult,
    /// Solver diagnostics.
    pub diagnostics: FitDiagnostics,
}

/// Result of the power-law fit `A (x - x_c)^nu`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerLawFit {
    /// Exponent.
    pub nu: FitResult,
    /// Amplitude.
    pub amplitude: FitResult,
    /// Offset `x_c`; absent for the origin-anchored form.
    pub offset: Option<FitResult>,
    /// Solver diagnostics.
    pub diagnostics: FitDiagnostics,
}

struct Saturation;

impl Model for Saturation {
    fn names(&self) -> &'static [&'static str] {
        &["o_eq", "t_eq"]
    }

    fn eval(&self, t: f64, params: &[f64]) -> f64 {
        params[0] * (1.0 - (-t / params[1]).exp())
    }

    fn gradient(&self, t: f64, params: &[f64], out: &mut [f64]) {
        let decay = (-t / params[1]).exp();
        out[0] = 1.0 - decay;
        out[1] = -params[0] * decay * t / (params[1] * params[1]);
    }

    fn admissible(&self, params: &[f64], _xs: &[f64]) -> bool {
        params[1] > 0.0
    }
}

struct Decay;

impl Model for Decay {
    fn names(&self) -> &'static [&'static str] {
        &["t_cor"]
    }

    fn eval(&self, t: f64, params: &[f64]) -> f64 {
        (-t / params[0]).exp()
    }

    fn gradient(&self, t: f64, params: &[f64], out: &mut [f64]) {
        out[0] = (-t / params[0]).exp() * t / (params[0] * params[0]);
    }

    fn admissible(&self, params: &[f64], _xs: &[f64]) -> bool {
        params[0] > 0.0
    }
}

struct ShiftedPowerLaw;

impl Model for ShiftedPowerLaw {
    fn names(&self) -> &'static [&'static str] {
        &["nu", "amplitude", "offset"]
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        params[1] * (x - params[2]).powf(params[0])
    }

    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]) {
        let [nu, amplitude, offset] = [params[0], params[1], params[2]];
        let base = x - offset;
        let power = base.powf(nu);
        out[0] = amplitude * power * base.ln();
        out[1] = power;
        out[2] = -amplitude * nu * power / base;
    }

    fn admissible(&self, params: &[f64], xs: &[f64]) -> bool {
        xs.iter().all(|&x| x - params[2] > 0.0)
    }
}

struct OriginPowerLaw;

impl Model for OriginPowerLaw {
    fn names(&self) -> &'static [&'static str] {
        &["nu", "amplitude"]
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        params[1] * x.powf(params[0])
    }

    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]) {
        let power = x.powf(params[0]);
        out[0] = params[1] * power * x.ln();
        out[1] = power;
    }
}

fn starting_point(
    model: &dyn Model,
    opts: &FitOpts,
    guess: impl FnOnce() -> Vec<f64>,
) -> Result<Vec<f64>, CdtError> {
    match &opts.initial_guess {
        Some(initial) if initial.len() != model.names().len() => Err(CdtError::Range(
            ErrorInfo::new("initial-guess", "initial guess has the wrong number of parameters")
                .with_context("expected", model.names().len())
                .with_context("actual", initial.len()),
        )),
        Some(initial) => Ok(initial.clone()),
        None => Ok(guess()),
    }
}

fn checked(name: &str, result: FitResult, opts: &FitOpts) -> Result<FitResult, CdtError> {
    let Some(threshold) = opts.max_relative_error else {
        return Ok(result);
    };
    let relative = result.relative_error();
    if relative > threshold || !relative.is_finite() {
        warn!(
            parameter = name,
            estimate = result.estimate,
            stderr = result.stderr,
            threshold,
            "fit rejected by relative error threshold"
        );
        return Err(CdtError::FitConvergence(
            ErrorInfo::new("relative-error", "fit uncertainty exceeds the accepted threshold")
                .with_context("parameter", name)
                .with_context("estimate", result.estimate)
                .with_context("stderr", result.stderr)
                .with_context("threshold", threshold),
        ));
    }
    Ok(result)
}

fn parameter(solution: &Solution, idx: usize) -> FitResult {
    FitResult::new(solution.params[idx], solution.stderr(idx))
}

/// Fits `O_eq (1 - exp(-t / t_eq))` to an observable recorded from a fresh start.
///
/// Sample `i` sits at time `i * time_unit`, so with one measurement every
/// tenth of a sweep a `time_unit` of 0.1 yields `t_eq` in sweeps.
pub fn fit_equilibration(
    series: &[f64],
    time_unit: f64,
    opts: &FitOpts,
) -> Result<EquilibrationFit, CdtError> {
    if !(time_unit > 0.0 && time_unit.is_finite()) {
        return Err(CdtError::Range(
            ErrorInfo::new("time-unit", "time unit must be positive").with_context("value", time_unit),
        ));
    }
    let times: Vec<f64> = (0..series.len()).map(|i| i as f64 * time_unit).collect();
    let problem = Problem::new(&times, series, None)?;
    let initial = starting_point(&Saturation, opts, || saturation_guess(&times, series))?;
    let solution = levenberg_marquardt(&Saturation, &problem, initial, opts)?;
    let t_eq = checked("t_eq", parameter(&solution, 1), opts)?;
    Ok(EquilibrationFit {
        t_eq,
        o_eq: parameter(&solution, 0),
        diagnostics: FitDiagnostics::from_solution(&Saturation, &solution),
    })
}

/// Fits `exp(-t / t_cor)` to a normalised autocorrelation profile.
pub fn fit_correlation_time(
    profile: &AutocorrelationProfile,
    opts: &FitOpts,
) -> Result<CorrelationFit, CdtError> {
    let lags: Vec<f64> = profile.lags.iter().map(|&lag| lag as f64).collect();
    let problem = Problem::new(&lags, &profile.values, None)?;
    let initial = starting_point(&Decay, opts, || vec![decay_guess(&lags, &profile.values)])?;
    let solution = levenberg_marquardt(&Decay, &problem, initial, opts)?;
    let t_cor = checked("t_cor", parameter(&solution, 0), opts)?;
    Ok(CorrelationFit {
        t_cor,
        diagnostics: FitDiagnostics::from_solution(&Decay, &solution),
    })
}

/// Fits `A (x - x_c)^nu`, the finite-size scaling form with a critical offset.
pub fn fit_power_law(
    xs: &[f64],
    ys: &[f64],
    sigma: Option<&[f64]>,
    opts: &FitOpts,
) -> Result<PowerLawFit, CdtError> {
    let problem = Problem::new(xs, ys, sigma)?;
    let initial = starting_point(&ShiftedPowerLaw, opts, || shifted_power_guess(xs, ys))?;
    let solution = levenberg_marquardt(&ShiftedPowerLaw, &problem, initial, opts)?;
    let nu = checked("nu", parameter(&solution, 0), opts)?;
    Ok(PowerLawFit {
        nu,
        amplitude: parameter(&solution, 1),
        offset: Some(parameter(&solution, 2)),
        diagnostics: FitDiagnostics::from_solution(&ShiftedPowerLaw, &solution),
    })
}

/// Fits `A x^nu` with the offset pinned at zero.
pub fn fit_power_law_origin(
    xs: &[f64],
    ys: &[f64],
    sigma: Option<&[f64]>,
    opts: &FitOpts,
) -> Result<PowerLawFit, CdtError> {
    if let Some(bad) = xs.iter().find(|&&x| x <= 0.0) {
        return Err(CdtError::Range(
            ErrorInfo::new("non-positive-abscissa", "power law without offset needs x > 0")
                .with_context("value", bad),
        ));
    }
    let problem = Problem::new(xs, ys, sigma)?;
    let initial = starting_point(&OriginPowerLaw, opts, || {
        log_log_guess(xs, ys, 0.0).unwrap_or_else(|| ratio_guess(xs, ys, 0.0))
    })?;
    let solution = levenberg_marquardt(&OriginPowerLaw, &problem, initial, opts)?;
    let nu = checked("nu", parameter(&solution, 0), opts)?;
    Ok(PowerLawFit {
        nu,
        amplitude: parameter(&solution, 1),
        offset: None,
        diagnostics: FitDiagnostics::from_solution(&OriginPowerLaw, &solution),
    })
}

fn saturation_guess(times: &[f64], series: &[f64]) -> Vec<f64> {
    if series.is_empty() {
        return vec![1.0, 1.0];
    }
    let tail = &series[series.len() - (series.len() / 4).max(1)..];
    let mut level = mean(tail);
    if level == 0.0 {
        level = series.iter().fold(0.0f64, |acc, v| acc.max(v.abs())).max(1.0);
    }
    let target = 1.0 - (-1.0f64).exp();
    let span = times.last().copied().unwrap_or(1.0).max(f64::MIN_POSITIVE);
    let t_eq = series
        .iter()
        .zip(times)
        .find(|&(value, _)| value / level >= target)
        .map(|(_, &t)| t)
        .filter(|&t| t > 0.0)
        .unwrap_or(span / 10.0);
    vec![level, t_eq]
}

fn decay_guess(lags: &[f64], values: &[f64]) -> f64 {
    let threshold = (-1.0f64).exp();
    lags.iter()
        .zip(values)
        .find(|&(_, &value)| value < threshold)
        .map(|(&lag, _)| lag)
        .or_else(|| lags.last().copied())
        .filter(|&lag| lag > 0.0)
        .unwrap_or(1.0)
}

fn shifted_power_guess(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let offset = if min > 0.0 {
        0.0
    } else {
        min - (max - min).max(1.0) * 0.1
    };
    let start = log_log_guess(xs, ys, offset).unwrap_or_else(|| ratio_guess(xs, ys, offset));
    vec![start[0], start[1], offset]
}

/// Linear regression of `ln y` on `ln (x - offset)`.
fn log_log_guess(xs: &[f64], ys: &[f64], offset: f64) -> Option<Vec<f64>> {
    if xs.len() < 2 || ys.iter().any(|&y| y <= 0.0) || xs.iter().any(|&x| x - offset <= 0.0) {
        return None;
    }
    let lx: Vec<f64> = xs.iter().map(|x| (x - offset).ln()).collect();
    let ly: Vec<f64> = ys.iter().map(|y| y.ln()).collect();
    let mx = mean(&lx);
    let my = mean(&ly);
    let sxx: f64 = lx.iter().map(|x| (x - mx) * (x - mx)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = lx.iter().zip(&ly).map(|(x, y)| (x - mx) * (y - my)).sum();
    let nu = sxy / sxx;
    Some(vec![nu, (my - nu * mx).exp()])
}

fn ratio_guess(xs: &[f64], ys: &[f64], offset: f64) -> Vec<f64> {
    let mx = xs.iter().map(|x| x - offset).sum::<f64>() / xs.len().max(1) as f64;
    let my = ys.iter().sum::<f64>() / ys.len().max(1) as f64;
    let amplitude = if mx != 0.0 { my / mx } else { 1.0 };
    vec![1.0, amplitude]
}
