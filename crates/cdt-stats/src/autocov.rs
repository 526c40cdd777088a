use cdt_core::errors::{CdtError, ErrorInfo};
use cdt_core::RawRunMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Normalisation convention of the lagged sum.
///
/// `Biased` truncates the sum at the end of the series and divides by the
/// full length `n`; it is the estimator for correlations along Monte Carlo
/// time. `Periodic` wraps the shift around the end of the series and is the
/// estimator for slice-to-slice correlations inside one configuration, whose
/// time direction is compact. Both divide by `n` so that lag 0 equals the
/// population variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AutocovMode {
    /// Truncated sum normalised by the full series length.
    #[default]
    Biased,
    /// Cyclic sum, index `(i + t) mod n`.
    Periodic,
}

/// Which lags of `0..max_lag` are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LagSampling {
    /// Every integer lag.
    #[default]
    Full,
    /// A fixed number of evenly spaced lags, `floor(j * max_lag / k)` for `j < k`.
    ///
    /// `k` is capped at `max_lag`, so every sampled lag is distinct.
    Resolution(usize),
}

/// Lagged autocovariance of a scalar series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocovarianceProfile {
    /// Convention used to compute the profile.
    pub mode: AutocovMode,
    /// Length of the source series.
    pub series_len: usize,
    /// Evaluated lags, starting with 0.
    pub lags: Vec<usize>,
    /// Autocovariance at each lag in `lags`.
    pub values: Vec<f64>,
}

/// Autocovariance normalised by its lag-0 value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocorrelationProfile {
    /// Evaluated lags, starting with 0.
    pub lags: Vec<usize>,
    /// Autocorrelation at each lag, `values[0] == 1.0`.
    pub values: Vec<f64>,
}

impl AutocovarianceProfile {
    /// Lag-0 entry, the population variance of the source series; 0.0 for an empty profile.
    pub fn variance(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    /// Divides every entry by the variance.
    pub fn autocorrelation(&self) -> Result<AutocorrelationProfile, CdtError> {
        if self.values.is_empty() || self.values.len() != self.lags.len() {
            return Err(CdtError::Shape(
                ErrorInfo::new("empty-profile", "profile needs one value per lag, starting at lag 0")
                    .with_context("lags", self.lags.len())
                    .with_context("values", self.values.len()),
            ));
        }
        let variance = self.variance();
        if variance == 0.0 || !variance.is_finite() {
            return Err(zero_variance(self.series_len));
        }
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(idx, value)| if idx == 0 { 1.0 } else { value / variance })
            .collect();
        Ok(AutocorrelationProfile {
            lags: self.lags.clone(),
            values,
        })
    }
}

fn zero_variance(len: usize) -> CdtError {
    CdtError::Shape(
        ErrorInfo::new("zero-variance", "series has zero variance, autocorrelation is undefined")
            .with_context("series_len", len),
    )
}

fn empty_series() -> CdtError {
    CdtError::shape("empty-series", "series must contain at least one sample")
}

pub(crate) fn mean(series: &[f64]) -> f64 {
    series.iter().sum::<f64>() / series.len() as f64
}

fn sample_lags(max_lag: usize, sampling: LagSampling) -> Result<Vec<usize>, CdtError> {
    match sampling {
        LagSampling::Full => Ok((0..max_lag).collect()),
        LagSampling::Resolution(0) => Err(CdtError::range(
            "resolution",
            "lag resolution must sample at least one point",
        )),
        LagSampling::Resolution(count) => {
            // more points than lags would repeat lags; cap at one point per lag
            let count = count.min(max_lag);
            Ok((0..count)
                .map(|j| ((j as f64) * (max_lag as f64 / count as f64)) as usize)
                .collect())
        }
    }
}

fn lagged_sum(series: &[f64], centre: f64, lag: usize, mode: AutocovMode) -> f64 {
    let n = series.len();
    match mode {
        AutocovMode::Biased => {
            if lag >= n {
                return 0.0;
            }
            series[..n - lag]
                .iter()
                .zip(&series[lag..])
                .map(|(a, b)| (a - centre) * (b - centre))
                .sum::<f64>()
                / n as f64
        }
        AutocovMode::Periodic => {
            let shift = lag % n;
            series
                .iter()
                .enumerate()
                .map(|(idx, a)| (a - centre) * (series[(idx + shift) % n] - centre))
                .sum::<f64>()
                / n as f64
        }
    }
}

fn check_max_lag(max_lag: usize, len: usize) -> Result<(), CdtError> {
    if max_lag == 0 || max_lag > len {
        return Err(CdtError::Range(
            ErrorInfo::new("max-lag", "max_lag must satisfy 0 < max_lag <= n")
                .with_context("max_lag", max_lag)
                .with_context("series_len", len),
        ));
    }
    Ok(())
}

/// Computes the autocovariance of `series` at the lags selected by `sampling`.
pub fn autocovariance(
    series: &[f64],
    max_lag: usize,
    mode: AutocovMode,
    sampling: LagSampling,
) -> Result<AutocovarianceProfile, CdtError> {
    if series.is_empty() {
        return Err(empty_series());
    }
    check_max_lag(max_lag, series.len())?;
    let lags = sample_lags(max_lag, sampling)?;
    Ok(profile_about(series, mean(series), lags, mode))
}

fn profile_about(
    series: &[f64],
    centre: f64,
    lags: Vec<usize>,
    mode: AutocovMode,
) -> AutocovarianceProfile {
    let values = lags
        .iter()
        .map(|&lag| lagged_sum(series, centre, lag, mode))
        .collect();
    AutocovarianceProfile {
        mode,
        series_len: series.len(),
        lags,
        values,
    }
}

/// Autocorrelation of `series` at a single lag.
///
/// Lag 0 is 1.0 by definition; in biased mode any lag at or beyond the
/// series length has no overlap and yields 0.0.
pub fn autocorrelation_at(series: &[f64], lag: usize, mode: AutocovMode) -> Result<f64, CdtError> {
    if series.is_empty() {
        return Err(empty_series());
    }
    let centre = mean(series);
    let variance = lagged_sum(series, centre, 0, mode);
    if variance == 0.0 {
        return Err(zero_variance(series.len()));
    }
    if lag == 0 {
        return Ok(1.0);
    }
    Ok(lagged_sum(series, centre, lag, mode) / variance)
}

/// First lag at which the autocorrelation drops below `1/e`.
pub fn first_crossing(profile: &AutocorrelationProfile) -> Result<usize, CdtError> {
    let threshold = (-1.0f64).exp();
    profile
        .lags
        .iter()
        .zip(&profile.values)
        .find(|&(_, &value)| value < threshold)
        .map(|(&lag, _)| lag)
        .ok_or_else(|| {
            CdtError::Range(
                ErrorInfo::new("no-crossing", "autocorrelation never drops below 1/e")
                    .with_context("max_lag", profile.lags.last().copied().unwrap_or(0)),
            )
            .with_hint("increase max_lag or use a longer series")
        })
}

/// Fit-free correlation time over the first `n / 2` lags of `series`.
pub fn correlation_time(series: &[f64]) -> Result<usize, CdtError> {
    let max_lag = (series.len() / 2).max(1);
    let profile = autocovariance(series, max_lag, AutocovMode::Biased, LagSampling::Full)?;
    first_crossing(&profile.autocorrelation()?)
}

/// Periodic autocovariance of every row of `matrix` around its grand mean.
pub fn slice_autocovariance(
    matrix: &RawRunMatrix,
    max_lag: usize,
) -> Result<Vec<AutocovarianceProfile>, CdtError> {
    check_max_lag(max_lag, matrix.n_slices())?;
    let centre = matrix.grand_mean();
    Ok(matrix
        .values()
        .par_chunks_exact(matrix.n_slices())
        .map(|row| {
            let series: Vec<f64> = row.iter().map(|&v| f64::from(v)).collect();
            profile_about(&series, centre, (0..max_lag).collect(), AutocovMode::Periodic)
        })
        .collect())
}

/// Row-averaged periodic autocorrelation of the slice lengths.
pub fn mean_slice_autocorrelation(
    matrix: &RawRunMatrix,
    max_lag: usize,
) -> Result<AutocorrelationProfile, CdtError> {
    let profiles = slice_autocovariance(matrix, max_lag)?;
    let mut sums = vec![0.0; max_lag];
    for (row, profile) in profiles.iter().enumerate() {
        let normalised = profile
            .autocorrelation()
            .map_err(|err| err.with_context("row", row))?;
        for (sum, value) in sums.iter_mut().zip(&normalised.values) {
            *sum += value;
        }
    }
    let rows = profiles.len() as f64;
    Ok(AutocorrelationProfile {
        lags: (0..max_lag).collect(),
        values: sums.into_iter().map(|sum| sum / rows).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biased_profile_divides_by_full_length() {
        let series = [1.0, 2.0, 3.0, 4.0];
        let profile = autocovariance(&series, 4, AutocovMode::Biased, LagSampling::Full).unwrap();
        // deviations: -1.5, -0.5, 0.5, 1.5
        assert!((profile.values[0] - 1.25).abs() < 1e-12);
        assert!((profile.values[1] - 0.3125).abs() < 1e-12);
        assert!((profile.values[3] + 0.5625).abs() < 1e-12);
    }

    #[test]
    fn periodic_profile_wraps() {
        let series = [1.0, 2.0, 3.0, 4.0];
        let profile =
            autocovariance(&series, 4, AutocovMode::Periodic, LagSampling::Full).unwrap();
        assert!((profile.values[0] - 1.25).abs() < 1e-12);
        // (-1.5*-0.5 + -0.5*0.5 + 0.5*1.5 + 1.5*-1.5) / 4
        assert!((profile.values[1] + 0.25).abs() < 1e-12);
        assert!((profile.values[1] - profile.values[3]).abs() < 1e-12);
    }

    #[test]
    fn max_lag_bounds() {
        let series = [1.0, 2.0, 3.0];
        for max_lag in [0, 4] {
            let err = autocovariance(&series, max_lag, AutocovMode::Biased, LagSampling::Full)
                .unwrap_err();
            assert!(matches!(err, CdtError::Range(_)));
        }
        assert!(matches!(
            autocovariance(&[], 1, AutocovMode::Biased, LagSampling::Full),
            Err(CdtError::Shape(_))
        ));
    }

    #[test]
    fn resolution_samples_even_lags() {
        let series: Vec<f64> = (0..50).map(|i| (i as f64 * 0.3).sin()).collect();
        let profile =
            autocovariance(&series, 40, AutocovMode::Biased, LagSampling::Resolution(8)).unwrap();
        assert_eq!(profile.lags, vec![0, 5, 10, 15, 20, 25, 30, 35]);
        assert!(matches!(
            autocovariance(&series, 40, AutocovMode::Biased, LagSampling::Resolution(0)),
            Err(CdtError::Range(_))
        ));
    }

    #[test]
    fn single_lag_edges() {
        let series = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(autocorrelation_at(&series, 0, AutocovMode::Biased).unwrap(), 1.0);
        assert_eq!(autocorrelation_at(&series, 5, AutocovMode::Biased).unwrap(), 0.0);
        assert_eq!(autocorrelation_at(&series, 9, AutocovMode::Biased).unwrap(), 0.0);
        let wrapped = autocorrelation_at(&series, 6, AutocovMode::Periodic).unwrap();
        let direct = autocorrelation_at(&series, 1, AutocovMode::Periodic).unwrap();
        assert!((wrapped - direct).abs() < 1e-12);
        assert!(matches!(
            autocorrelation_at(&[2.0, 2.0], 1, AutocovMode::Biased),
            Err(CdtError::Shape(_))
        ));
    }

    #[test]
    fn no_crossing_is_reported() {
        let profile = AutocorrelationProfile {
            lags: vec![0, 1, 2],
            values: vec![1.0, 0.9, 0.8],
        };
        let err = first_crossing(&profile).unwrap_err();
        assert_eq!(err.info().code, "no-crossing");
    }

    #[test]
    fn slice_profiles_use_grand_mean() {
        let matrix = RawRunMatrix::from_rows(vec![vec![1, 3, 1, 3], vec![3, 1, 3, 1]]).unwrap();
        let profiles = slice_autocovariance(&matrix, 3).unwrap();
        assert_eq!(profiles.len(), 2);
        assert!((profiles[0].values[0] - 1.0).abs() < 1e-12);
        assert!((profiles[0].values[1] + 1.0).abs() < 1e-12);
        let mean = mean_slice_autocorrelation(&matrix, 3).unwrap();
        assert_eq!(mean.values[0], 1.0);
        assert!((mean.values[1] + 1.0).abs() < 1e-12);
        assert!((mean.values[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_profile_is_a_shape_error() {
        let profile = AutocovarianceProfile {
            mode: AutocovMode::Biased,
            series_len: 0,
            lags: vec![],
            values: vec![],
        };
        assert_eq!(profile.variance(), 0.0);
        let err = profile.autocorrelation().unwrap_err();
        assert!(matches!(err, CdtError::Shape(_)));
        assert_eq!(err.info().code, "empty-profile");
    }

    #[test]
    fn oversampled_resolution_keeps_lags_distinct() {
        let series: Vec<f64> = (0..20).map(|i| (i as f64 * 0.7).cos()).collect();
        let profile =
            autocovariance(&series, 4, AutocovMode::Biased, LagSampling::Resolution(10)).unwrap();
        assert_eq!(profile.lags, vec![0, 1, 2, 3]);
    }
}
