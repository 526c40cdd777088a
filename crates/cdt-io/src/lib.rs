#![deny(missing_docs)]
#![doc = "Filesystem surface of the CDT analysis workspace: run discovery, data loading, configuration and canonical reports."]

/// Analysis configuration loaded from YAML.
pub mod config;
/// Stable hashing of serialisable values.
pub mod hash;
/// Delimited data file readers.
pub mod loader;
/// Hashed report envelopes and writers.
pub mod output;
/// Discovery and filtering of simulator run records.
pub mod registry;
/// Canonical JSON and YAML helpers.
pub mod serde;

pub use config::AnalysisConfig;
pub use hash::stable_hash_string;
pub use loader::{data_path, load_matrix, load_series};
pub use output::{seal, write_report, SealedReport};
pub use registry::{discover_runs, RunEntry, RunFilter};
pub use crate::serde::{from_json_slice, from_yaml_slice, to_canonical_json_bytes};
