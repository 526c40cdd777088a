use serde::{Deserialize, Serialize};

use crate::errors::{CdtError, ErrorInfo};

/// Parameter record written by the simulator next to every data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Identifier shared with the `<name>.csv` data file.
    pub name: String,
    /// Target number of links per time-slice.
    pub length: usize,
    /// Number of time-slices T.
    pub timespan: usize,
    /// Acceptance ratio of the shard move during measurement.
    pub move_ratio: f64,
    /// Whether the run was a measurement (as opposed to a test) run.
    #[serde(default)]
    pub is_measurement: bool,
    /// Number of saved measurements.
    #[serde(default)]
    pub n_save: usize,
    /// Monte Carlo steps between measurements.
    #[serde(default)]
    pub pause: usize,
    /// Move ratio used during the equilibration phase.
    #[serde(default)]
    pub move_ratio_eq: Option<f64>,
    /// Length of the equilibration phase in sweeps.
    #[serde(default)]
    pub eq_sweeps: usize,
}

impl RunParameters {
    /// Number of triangles N = 2 · length · timespan, which is also one sweep.
    pub fn triangle_count(&self) -> usize {
        2 * self.length * self.timespan
    }

    /// Rejects records whose ratios fall outside [0, 1].
    pub fn validate(&self) -> Result<(), CdtError> {
        let ratios = std::iter::once(("move_ratio", self.move_ratio))
            .chain(self.move_ratio_eq.map(|ratio| ("move_ratio_eq", ratio)));
        for (field, ratio) in ratios {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(CdtError::Range(
                    ErrorInfo::new("move-ratio", "move ratio outside [0, 1]")
                        .with_context("field", field)
                        .with_context("value", ratio)
                        .with_context("run", &self.name),
                ));
            }
        }
        if self.timespan == 0 || self.length == 0 {
            return Err(CdtError::Range(
                ErrorInfo::new("empty-universe", "length and timespan must be positive")
                    .with_context("run", &self.name),
            ));
        }
        Ok(())
    }
}
