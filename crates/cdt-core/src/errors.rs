//! Structured error types shared across the CDT analysis crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`CdtError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (lags, lengths, thresholds, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CdtError {
    /// Malformed or empty input arrays.
    #[error("shape error: {0}")]
    Shape(ErrorInfo),
    /// Parameters outside their valid domain.
    #[error("range error: {0}")]
    Range(ErrorInfo),
    /// Least-squares solver failures and rejected fits.
    #[error("fit convergence error: {0}")]
    FitConvergence(ErrorInfo),
    /// Missing input files or directories.
    #[error("not found: {0}")]
    NotFound(ErrorInfo),
    /// Malformed delimited input.
    #[error("parse error: {0}")]
    Parse(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl CdtError {
    /// Shorthand for a [`CdtError::Shape`] with the given code and message.
    pub fn shape(code: &str, message: impl Into<String>) -> Self {
        CdtError::Shape(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`CdtError::Range`] with the given code and message.
    pub fn range(code: &str, message: impl Into<String>) -> Self {
        CdtError::Range(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`CdtError::FitConvergence`] with the given code and message.
    pub fn fit(code: &str, message: impl Into<String>) -> Self {
        CdtError::FitConvergence(ErrorInfo::new(code, message))
    }

    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            CdtError::Shape(info)
            | CdtError::Range(info)
            | CdtError::FitConvergence(info)
            | CdtError::NotFound(info)
            | CdtError::Parse(info)
            | CdtError::Serde(info) => info,
        }
    }

    /// Attaches a context entry to the payload, keeping the variant.
    pub fn with_context(self, key: impl Into<String>, value: impl ToString) -> Self {
        match self {
            CdtError::Shape(info) => CdtError::Shape(info.with_context(key, value)),
            CdtError::Range(info) => CdtError::Range(info.with_context(key, value)),
            CdtError::FitConvergence(info) => {
                CdtError::FitConvergence(info.with_context(key, value))
            }
            CdtError::NotFound(info) => CdtError::NotFound(info.with_context(key, value)),
            CdtError::Parse(info) => CdtError::Parse(info.with_context(key, value)),
            CdtError::Serde(info) => CdtError::Serde(info.with_context(key, value)),
        }
    }

    /// Attaches a remediation hint to the payload, keeping the variant.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        match self {
            CdtError::Shape(info) => CdtError::Shape(info.with_hint(hint)),
            CdtError::Range(info) => CdtError::Range(info.with_hint(hint)),
            CdtError::FitConvergence(info) => CdtError::FitConvergence(info.with_hint(hint)),
            CdtError::NotFound(info) => CdtError::NotFound(info.with_hint(hint)),
            CdtError::Parse(info) => CdtError::Parse(info.with_hint(hint)),
            CdtError::Serde(info) => CdtError::Serde(info.with_hint(hint)),
        }
    }
}
