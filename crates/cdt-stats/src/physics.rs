use cdt_core::errors::{CdtError, ErrorInfo};
use cdt_core::FitResult;

/// Cosmological constant `1 / (2 sigma^2)` from a measured length-profile width.
///
/// The uncertainty propagates as `sigma_err / sigma^3`.
pub fn cosmological_constant(std: FitResult) -> Result<FitResult, CdtError> {
    if !(std.estimate.is_finite() && std.estimate != 0.0) {
        return Err(CdtError::Range(
            ErrorInfo::new("zero-width", "cosmological constant needs a non-zero width")
                .with_context("std", std.estimate),
        ));
    }
    let sigma = std.estimate;
    Ok(FitResult::new(
        0.5 / (sigma * sigma),
        std.stderr / (sigma * sigma * sigma).abs(),
    ))
}
