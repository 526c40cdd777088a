use serde::{Deserialize, Serialize};

use crate::errors::{CdtError, ErrorInfo};

/// Sweep × time-slice matrix of slice lengths recorded during a run.
///
/// Row `i` is the measurement taken at Monte Carlo time `i`, column `j` the
/// length of time-slice `j`. Storage is row-major and never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr")]
pub struct RawRunMatrix {
    n_samples: usize,
    n_slices: usize,
    values: Vec<u32>,
}

/// Wire form of [`RawRunMatrix`], validated through [`RawRunMatrix::new`].
#[derive(Deserialize)]
struct MatrixRepr {
    n_samples: usize,
    n_slices: usize,
    values: Vec<u32>,
}

impl TryFrom<MatrixRepr> for RawRunMatrix {
    type Error = CdtError;

    fn try_from(repr: MatrixRepr) -> Result<Self, Self::Error> {
        RawRunMatrix::new(repr.n_samples, repr.n_slices, repr.values)
    }
}

impl RawRunMatrix {
    /// Builds a matrix from a row-major buffer.
    pub fn new(n_samples: usize, n_slices: usize, values: Vec<u32>) -> Result<Self, CdtError> {
        if n_samples == 0 || n_slices == 0 {
            return Err(CdtError::Shape(
                ErrorInfo::new("empty-matrix", "run matrix requires at least one row and column")
                    .with_context("n_samples", n_samples)
                    .with_context("n_slices", n_slices),
            ));
        }
        if values.len() != n_samples * n_slices {
            return Err(CdtError::Shape(
                ErrorInfo::new("buffer-size", "buffer length does not match the matrix shape")
                    .with_context("expected", n_samples * n_slices)
                    .with_context("actual", values.len()),
            ));
        }
        Ok(Self {
            n_samples,
            n_slices,
            values,
        })
    }

    /// Builds a matrix from individual rows, rejecting ragged input.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Result<Self, CdtError> {
        let n_samples = rows.len();
        let n_slices = rows.first().map(Vec::len).unwrap_or(0);
        let mut values = Vec::with_capacity(n_samples * n_slices);
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != n_slices {
                return Err(CdtError::Shape(
                    ErrorInfo::new("ragged-rows", "all rows must have the same number of slices")
                        .with_context("row", idx)
                        .with_context("expected", n_slices)
                        .with_context("actual", row.len()),
                ));
            }
            values.extend(row);
        }
        Self::new(n_samples, n_slices, values)
    }

    /// Number of recorded samples (rows).
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of time-slices (columns).
    pub fn n_slices(&self) -> usize {
        self.n_slices
    }

    /// Row-major view of all values.
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Returns row `idx`; panics when out of bounds like slice indexing.
    pub fn row(&self, idx: usize) -> &[u32] {
        let start = idx * self.n_slices;
        &self.values[start..start + self.n_slices]
    }

    /// Iterates over the rows in Monte Carlo time order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u32]> + '_ {
        self.values.chunks_exact(self.n_slices)
    }

    /// Drops the first `count` rows (burn-in) and returns the remainder.
    pub fn discard(&self, count: usize) -> Result<Self, CdtError> {
        if count >= self.n_samples {
            return Err(CdtError::Range(
                ErrorInfo::new("discard-count", "burn-in would discard every sample")
                    .with_context("discard_count", count)
                    .with_context("n_samples", self.n_samples),
            ));
        }
        Ok(Self {
            n_samples: self.n_samples - count,
            n_slices: self.n_slices,
            values: self.values[count * self.n_slices..].to_vec(),
        })
    }

    /// Mean over every entry of the matrix.
    pub fn grand_mean(&self) -> f64 {
        self.values.iter().map(|&v| f64::from(v)).sum::<f64>() / self.values.len() as f64
    }
}
