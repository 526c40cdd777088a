use cdt_core::errors::{CdtError, ErrorInfo};
use cdt_core::RawRunMatrix;
use serde::{Deserialize, Serialize};

/// Rule collapsing the slice axis of a run matrix into a scalar series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReductionRule {
    /// Population standard deviation of the slice lengths in each row.
    #[default]
    StdDev,
    /// Mean slice length of each row.
    Mean,
    /// Every entry divided by the mean of its column, flattened row-major.
    ColumnNormalized,
    /// Every entry divided by the grand mean, flattened row-major.
    GrandNormalized,
}

/// Reduces `matrix` to a scalar series according to `rule`.
pub fn reduce(matrix: &RawRunMatrix, rule: ReductionRule) -> Result<Vec<f64>, CdtError> {
    match rule {
        ReductionRule::StdDev => Ok(matrix.rows().map(row_std).collect()),
        ReductionRule::Mean => Ok(matrix.rows().map(row_mean).collect()),
        ReductionRule::ColumnNormalized => {
            let means = column_means(matrix);
            if let Some(column) = means.iter().position(|&mean| mean == 0.0) {
                return Err(zero_normaliser("column", column));
            }
            Ok(matrix
                .rows()
                .flat_map(|row| {
                    row.iter()
                        .zip(means.iter())
                        .map(|(&value, &mean)| f64::from(value) / mean)
                })
                .collect())
        }
        ReductionRule::GrandNormalized => {
            let grand = matrix.grand_mean();
            if grand == 0.0 {
                return Err(zero_normaliser("grand", 0));
            }
            Ok(matrix
                .values()
                .iter()
                .map(|&value| f64::from(value) / grand)
                .collect())
        }
    }
}

/// Drops `discard_count` burn-in rows before reducing.
pub fn reduce_after(
    matrix: &RawRunMatrix,
    rule: ReductionRule,
    discard_count: usize,
) -> Result<Vec<f64>, CdtError> {
    if discard_count == 0 {
        return reduce(matrix, rule);
    }
    reduce(&matrix.discard(discard_count)?, rule)
}

fn zero_normaliser(kind: &str, column: usize) -> CdtError {
    CdtError::Shape(
        ErrorInfo::new("zero-normaliser", "normalising mean is zero")
            .with_context("kind", kind)
            .with_context("column", column),
    )
}

fn row_mean(row: &[u32]) -> f64 {
    row.iter().map(|&v| f64::from(v)).sum::<f64>() / row.len() as f64
}

fn row_std(row: &[u32]) -> f64 {
    let mean = row_mean(row);
    let var = row
        .iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / row.len() as f64;
    var.sqrt()
}

fn column_means(matrix: &RawRunMatrix) -> Vec<f64> {
    let mut sums = vec![0.0; matrix.n_slices()];
    for row in matrix.rows() {
        for (sum, &value) in sums.iter_mut().zip(row) {
            *sum += f64::from(value);
        }
    }
    let n = matrix.n_samples() as f64;
    sums.into_iter().map(|sum| sum / n).collect()
}
