use cdt_core::errors::{CdtError, ErrorInfo};
use cdt_core::FitResult;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::autocov::{autocovariance, first_crossing, mean, AutocovMode, LagSampling};

/// Advisory raised when the batch means are themselves correlated.
///
/// The reported standard error is then likely an underestimate; the caller
/// decides whether to increase the batch size or accept the flagged result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonIndependentBatchesWarning {
    /// Number of batches inspected.
    pub batch_count: usize,
    /// First-crossing correlation time of the batch means, `None` if they never decorrelate.
    pub correlation_time: Option<usize>,
}

/// Mean and standard error over independent batch estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchedEstimate {
    /// Mean of the per-batch estimates.
    pub mean: f64,
    /// `std / sqrt(batch_count - 1)` with the population standard deviation.
    pub stderr: f64,
    /// Number of batches.
    pub batch_count: usize,
    /// Per-batch estimates in batch order.
    pub estimates: Vec<f64>,
    /// Sequence inspected by the independence check.
    pub batch_means: Vec<f64>,
    /// Set when the batch means show a correlation time above one batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<NonIndependentBatchesWarning>,
}

impl BatchedEstimate {
    /// Estimate/uncertainty pair of the batch mean.
    pub fn result(&self) -> FitResult {
        FitResult::new(self.mean, self.stderr)
    }
}

/// Element-wise batch statistics of a profile-valued observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchedProfile {
    /// Batch mean at each profile index.
    pub mean: Vec<f64>,
    /// Standard error at each profile index.
    pub stderr: Vec<f64>,
    /// Number of batches.
    pub batch_count: usize,
}

fn check_batch_count(batch_count: usize) -> Result<(), CdtError> {
    if batch_count < 2 {
        return Err(CdtError::Range(
            ErrorInfo::new("batch-count", "standard error needs at least two batches")
                .with_context("batch_count", batch_count),
        ));
    }
    Ok(())
}

fn batch_len(len: usize, batch_count: usize) -> Result<usize, CdtError> {
    check_batch_count(batch_count)?;
    let size = len / batch_count;
    if size == 0 {
        return Err(CdtError::Range(
            ErrorInfo::new("empty-batch", "too few samples for the requested batches")
                .with_context("samples", len)
                .with_context("batch_count", batch_count),
        ));
    }
    Ok(size)
}

/// Mean and standard error `std / sqrt(k - 1)` of `k >= 2` estimates.
pub fn aggregate(estimates: &[f64]) -> Result<FitResult, CdtError> {
    check_batch_count(estimates.len())?;
    let k = estimates.len() as f64;
    let centre = mean(estimates);
    let var = estimates.iter().map(|e| (e - centre) * (e - centre)).sum::<f64>() / k;
    Ok(FitResult::new(centre, var.sqrt() / (k - 1.0).sqrt()))
}

/// Checks whether a sequence of batch means decorrelates within one batch.
///
/// A constant sequence carries no evidence of correlation and passes.
pub fn independence_check(batch_means: &[f64]) -> Option<NonIndependentBatchesWarning> {
    let profile = autocovariance(
        batch_means,
        batch_means.len(),
        AutocovMode::Biased,
        LagSampling::Full,
    )
    .ok()?;
    let correlation = profile.autocorrelation().ok()?;
    let correlation_time = match first_crossing(&correlation) {
        Ok(time) if time <= 1 => return None,
        Ok(time) => Some(time),
        Err(_) => None,
    };
    warn!(
        batch_count = batch_means.len(),
        correlation_time = ?correlation_time,
        "batch means are not independent, standard error may be underestimated"
    );
    Some(NonIndependentBatchesWarning {
        batch_count: batch_means.len(),
        correlation_time,
    })
}

fn finish(estimates: Vec<f64>, batch_means: Vec<f64>) -> Result<BatchedEstimate, CdtError> {
    let result = aggregate(&estimates)?;
    let warning = independence_check(&batch_means);
    Ok(BatchedEstimate {
        mean: result.estimate,
        stderr: result.stderr,
        batch_count: estimates.len(),
        estimates,
        batch_means,
        warning,
    })
}

/// Splits `series` into `batch_count` contiguous equal batches and aggregates
/// `per_batch` over them.
///
/// Trailing samples that do not fill a whole batch are dropped. Batches are
/// evaluated in parallel.
pub fn batch_estimate<F>(
    series: &[f64],
    batch_count: usize,
    per_batch: F,
) -> Result<BatchedEstimate, CdtError>
where
    F: Fn(&[f64]) -> Result<f64, CdtError> + Sync + Send,
{
    let size = batch_len(series.len(), batch_count)?;
    let batches = &series[..size * batch_count];
    let estimates = batches
        .par_chunks_exact(size)
        .enumerate()
        .map(|(idx, batch)| per_batch(batch).map_err(|err| err.with_context("batch", idx)))
        .collect::<Result<Vec<f64>, CdtError>>()?;
    let batch_means = batches.chunks_exact(size).map(mean).collect();
    finish(estimates, batch_means)
}

/// Aggregates one estimate per repeated run.
///
/// The independence check runs on the per-run estimates in the order given.
/// Repeated runs are meant to be independent, so a warning here points at a
/// drift across the run sequence (a shared seed, or a setting that changed
/// between launches) rather than at Monte Carlo autocorrelation.
pub fn batch_runs<T, F>(runs: &[T], per_run: F) -> Result<BatchedEstimate, CdtError>
where
    T: Sync,
    F: Fn(&T) -> Result<f64, CdtError> + Sync + Send,
{
    check_batch_count(runs.len())?;
    let estimates = runs
        .par_iter()
        .enumerate()
        .map(|(idx, run)| per_run(run).map_err(|err| err.with_context("run", idx)))
        .collect::<Result<Vec<f64>, CdtError>>()?;
    finish(estimates.clone(), estimates)
}

/// Batches equally long per-row profiles and reports element-wise mean and error.
pub fn batch_profile(rows: &[Vec<f64>], batch_count: usize) -> Result<BatchedProfile, CdtError> {
    let size = batch_len(rows.len(), batch_count)?;
    let width = rows[0].len();
    if let Some(idx) = rows.iter().position(|row| row.len() != width) {
        return Err(CdtError::Shape(
            ErrorInfo::new("ragged-profiles", "profiles must share one length")
                .with_context("row", idx)
                .with_context("expected", width),
        ));
    }
    let batch_means: Vec<Vec<f64>> = rows[..size * batch_count]
        .par_chunks_exact(size)
        .map(|batch| {
            let mut sums = vec![0.0; width];
            for row in batch {
                for (sum, value) in sums.iter_mut().zip(row) {
                    *sum += value;
                }
            }
            sums.into_iter().map(|sum| sum / size as f64).collect()
        })
        .collect();
    let mut profile_mean = Vec::with_capacity(width);
    let mut stderr = Vec::with_capacity(width);
    for column in 0..width {
        let values: Vec<f64> = batch_means.iter().map(|batch| batch[column]).collect();
        let result = aggregate(&values)?;
        profile_mean.push(result.estimate);
        stderr.push(result.stderr);
    }
    Ok(BatchedProfile {
        mean: profile_mean,
        stderr,
        batch_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_matches_hand_computation() {
        let result = aggregate(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(result.estimate, 2.5);
        // population variance 1.25, k - 1 = 3
        assert!((result.stderr - (1.25f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn batch_count_must_exceed_one() {
        let series = [1.0, 2.0, 3.0];
        let err = batch_estimate(&series, 1, |batch| Ok(mean(batch))).unwrap_err();
        assert_eq!(err.info().code, "batch-count");
        let err = batch_estimate(&series, 4, |batch| Ok(mean(batch))).unwrap_err();
        assert_eq!(err.info().code, "empty-batch");
    }

    #[test]
    fn remainder_is_dropped() {
        let series = [1.0, 1.0, 3.0, 3.0, 100.0];
        let estimate = batch_estimate(&series, 2, |batch| Ok(mean(batch))).unwrap();
        assert_eq!(estimate.estimates, vec![1.0, 3.0]);
        assert_eq!(estimate.mean, 2.0);
        assert!((estimate.stderr - 1.0).abs() < 1e-12);
    }

    #[test]
    fn per_batch_failure_carries_index() {
        let series: Vec<f64> = (0..8).map(f64::from).collect();
        let err = batch_estimate(&series, 4, |batch| {
            if batch[0] >= 4.0 {
                Err(CdtError::fit("max-iterations", "no convergence"))
            } else {
                Ok(batch[0])
            }
        })
        .unwrap_err();
        assert!(matches!(err, CdtError::FitConvergence(_)));
        assert!(err.info().context.contains_key("batch"));
    }

    #[test]
    fn trending_means_raise_warning() {
        let means: Vec<f64> = (0..10).map(f64::from).collect();
        let warning = independence_check(&means).expect("trend is correlated");
        assert_eq!(warning.batch_count, 10);
        assert!(warning.correlation_time.map_or(true, |t| t > 1));
    }

    #[test]
    fn alternating_means_pass() {
        let means = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        assert!(independence_check(&means).is_none());
        assert!(independence_check(&[2.0, 2.0, 2.0]).is_none());
    }

    #[test]
    fn profiles_batch_elementwise() {
        let rows = vec![
            vec![1.0, 10.0],
            vec![3.0, 10.0],
            vec![5.0, 20.0],
            vec![7.0, 20.0],
        ];
        let profile = batch_profile(&rows, 2).unwrap();
        assert_eq!(profile.mean, vec![4.0, 15.0]);
        assert!((profile.stderr[0] - 2.0).abs() < 1e-12);
        assert!((profile.stderr[1] - 5.0).abs() < 1e-12);
    }
}
