//! Centralized error handling for flowprep.
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error type
//! is [`FlowprepError`]. The variants follow the preprocessing error taxonomy:
//!
//! | Variant                 | Raised by                   | Surfaced as            |
//! |-------------------------|-----------------------------|------------------------|
//! | `Configuration`         | options validation, config  | caller-synchronous     |
//! | `QuotaExceeded`         | quota enforcement           | caller-synchronous     |
//! | `UnsupportedOperation`  | a pipeline stage            | job failure            |
//! | `Processing`            | a pipeline stage, internals | job failure            |
//! | `Conflict`              | job submission / purge      | caller-synchronous     |
//! | `NotReady`, `NotFound`  | job queries                 | caller-synchronous     |
//!
//! Pipeline errors never reach the submitter of a job directly. The worker records
//! the [`ErrorCategory`] and message on the job, and that pair is the job's
//! permanent record:
//!
//! ```
//! use flowprep::error::{ErrorCategory, FlowprepError};
//!
//! let err = FlowprepError::unsupported("city", "mean", "column is not numeric");
//! assert_eq!(err.category(), ErrorCategory::UnsupportedOperation);
//! assert!(err.to_string().contains("city"));
//! ```
//!
//! ## Context Extension Trait
//!
//! [`ResultExt`] adds `.context()` to any `Result` whose error converts into
//! [`FlowprepError`], mirroring `anyhow::Context` for the crate error type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::quota::{QuotaCheck, Tier};

/// Main error type for flowprep operations.
#[derive(Debug)]
pub enum FlowprepError {
    /// Invalid preprocessing options or service configuration.
    Configuration {
        /// Offending field (or configuration key).
        field: String,
        /// What is wrong, including the allowed values where they are enumerable.
        message: String,
    },

    /// Admission denied by the tier quota.
    QuotaExceeded {
        tier: Tier,
        check: QuotaCheck,
        /// The value the request would reach.
        requested: u64,
        limit: u64,
    },

    /// A stage cannot apply its method to a column.
    UnsupportedOperation {
        column: String,
        method: String,
        reason: String,
    },

    /// Unexpected internal failure (Polars, shape mismatch, poisoned lock, ...).
    Processing(String),

    /// A second active job was requested for the same dataset, or an active job
    /// was asked to be purged.
    Conflict(String),

    /// The job exists but has not completed.
    NotReady { job_id: String, status: String },

    /// Unknown job or dataset identifier.
    NotFound(String),

    /// I/O errors while exporting results or reading configuration.
    Io(std::io::Error),
}

impl FlowprepError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(
        column: impl Into<String>,
        method: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedOperation {
            column: column.into(),
            method: method.into(),
            reason: reason.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing(message.into())
    }

    /// The permanent category recorded on a failed job.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::QuotaExceeded { .. } => ErrorCategory::QuotaExceeded,
            Self::UnsupportedOperation { .. } => ErrorCategory::UnsupportedOperation,
            Self::Processing(_) | Self::Io(_) => ErrorCategory::Processing,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::NotReady { .. } => ErrorCategory::NotReady,
            Self::NotFound(_) => ErrorCategory::NotFound,
        }
    }
}

impl fmt::Display for FlowprepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { field, message } => {
                write!(f, "Configuration error: `{field}`: {message}")
            }
            Self::QuotaExceeded {
                tier,
                check,
                requested,
                limit,
            } => write!(
                f,
                "Quota exceeded ({} check): {requested} exceeds the {tier} tier limit of {limit}",
                check.as_str()
            ),
            Self::UnsupportedOperation {
                column,
                method,
                reason,
            } => write!(
                f,
                "Unsupported operation: cannot apply `{method}` to column '{column}': {reason}"
            ),
            Self::Processing(msg) => write!(f, "Processing error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::NotReady { job_id, status } => {
                write!(f, "Job {job_id} is not ready (status: {status})")
            }
            Self::NotFound(what) => write!(f, "Not found: {what}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for FlowprepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FlowprepError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for FlowprepError {
    fn from(err: anyhow::Error) -> Self {
        Self::Processing(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for FlowprepError {
    fn from(err: serde_json::Error) -> Self {
        Self::config("json", err.to_string())
    }
}

impl From<polars::error::PolarsError> for FlowprepError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::Processing(err.to_string())
    }
}

/// Error category stored on a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    QuotaExceeded,
    UnsupportedOperation,
    Processing,
    Conflict,
    NotReady,
    NotFound,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::QuotaExceeded => "quota_exceeded",
            Self::UnsupportedOperation => "unsupported_operation",
            Self::Processing => "processing",
            Self::Conflict => "conflict",
            Self::NotReady => "not_ready",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for flowprep operations.
pub type Result<T> = std::result::Result<T, FlowprepError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error. The category of the original error is kept.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<FlowprepError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| prefix(e.into(), &msg.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| prefix(e.into(), &f()))
    }
}

fn prefix(err: FlowprepError, msg: &str) -> FlowprepError {
    match err {
        FlowprepError::Processing(inner) => FlowprepError::Processing(format!("{msg}: {inner}")),
        FlowprepError::Io(inner) => FlowprepError::Io(std::io::Error::new(
            inner.kind(),
            format!("{msg}: {inner}"),
        )),
        FlowprepError::Configuration { field, message } => FlowprepError::Configuration {
            field,
            message: format!("{msg}: {message}"),
        },
        other => other,
    }
}
