#![deny(missing_docs)]
#![doc = "Shared error type and data model for the CDT Monte Carlo analysis workspace."]

pub mod errors;
/// Raw sweep × time-slice run matrices.
pub mod matrix;
/// Simulator parameter records.
pub mod params;
mod types;

pub use errors::{CdtError, ErrorInfo};
pub use matrix::RawRunMatrix;
pub use params::RunParameters;
pub use types::FitResult;
