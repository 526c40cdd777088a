#![deny(missing_docs)]
#![doc = "Estimators for CDT Monte Carlo output: observable reduction, autocorrelation, parametric fits and batched errors."]

/// Autocovariance and autocorrelation estimators.
pub mod autocov;
/// Batched mean and standard error with an independence check.
pub mod batch;
/// Levenberg-Marquardt fits of the equilibration, decay and power-law models.
pub mod fit;
/// Quantities derived from fitted and batched estimates.
pub mod physics;
/// Reduction of raw run matrices to scalar series.
pub mod reduce;
mod solver;

pub use autocov::{
    autocorrelation_at, autocovariance, correlation_time, first_crossing,
    mean_slice_autocorrelation, slice_autocovariance, AutocorrelationProfile,
    AutocovMode, AutocovarianceProfile, LagSampling,
};
pub use batch::{
    aggregate, batch_estimate, batch_profile, batch_runs, independence_check, BatchedEstimate,
    BatchedProfile, NonIndependentBatchesWarning,
};
pub use fit::{
    fit_correlation_time, fit_equilibration, fit_power_law, fit_power_law_origin,
    CorrelationFit, EquilibrationFit, FitDiagnostics, FitOpts, PowerLawFit,
};
pub use physics::cosmological_constant;
pub use reduce::{reduce, reduce_after, ReductionRule};
