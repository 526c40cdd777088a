use serde::{Deserialize, Serialize};

/// Point estimate of a physical quantity with its one-sigma uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Best estimate.
    pub estimate: f64,
    /// Standard error of the estimate.
    pub stderr: f64,
}

impl FitResult {
    /// Creates a new estimate/uncertainty pair.
    pub fn new(estimate: f64, stderr: f64) -> Self {
        Self { estimate, stderr }
    }

    /// Ratio `stderr / |estimate|`; infinite for a zero estimate.
    pub fn relative_error(&self) -> f64 {
        if self.estimate == 0.0 {
            f64::INFINITY
        } else {
            (self.stderr / self.estimate).abs()
        }
    }

    /// Multiplies estimate and uncertainty by a constant factor.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            estimate: self.estimate * factor,
            stderr: self.stderr * factor.abs(),
        }
    }
}
