//! Error types for the search subsystem.
//!
//! Every error maps to an HTTP status and a FHIR operation-outcome issue so
//! the REST layer can render it without inspecting variants. Driver errors
//! are wrapped with a site tag naming the operation that failed.

use serde::Serialize;
use thiserror::Error;

/// MongoDB server error code for an interrupted operation, see:
/// https://github.com/mongodb/mongo/blob/master/src/mongo/base/error_codes.yml
const OP_INTERRUPTED_CODE: i32 = 11601;

/// Convenience alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// The error type for query compilation and execution.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The parameter type, modifier, prefix, or target combination is not
    /// implemented (HTTP 501).
    #[error("unsupported search: {0}")]
    Unsupported(String),

    /// The parameter is well-formed but its content is invalid (HTTP 400).
    #[error("invalid search: {0}")]
    Invalid(String),

    /// An internal invariant was violated (HTTP 500).
    #[error("internal search error: {0}")]
    Internal(String),

    /// The database killed or cancelled the operation (HTTP 500,
    /// "too-costly").
    #[error("operation interrupted: {0}")]
    OpInterrupted(String),

    /// A driver operation failed. `context` names the call site.
    #[error("{context}: {source}")]
    Database {
        /// Site tag for diagnostics, e.g. "search find operation failed".
        context: &'static str,
        /// The underlying driver error.
        #[source]
        source: mongodb::error::Error,
    },
}

/// A single issue of a FHIR OperationOutcome payload.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeIssue {
    /// Issue severity: "error" or "fatal".
    pub severity: &'static str,
    /// FHIR issue type code.
    pub code: &'static str,
    /// Human-readable diagnostics.
    pub diagnostics: String,
}

impl SearchError {
    /// Shorthand for an [`SearchError::Unsupported`] error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        SearchError::Unsupported(message.into())
    }

    /// Shorthand for an [`SearchError::Invalid`] error.
    pub fn invalid(message: impl Into<String>) -> Self {
        SearchError::Invalid(message.into())
    }

    /// Shorthand for an [`SearchError::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self {
        SearchError::Internal(message.into())
    }

    /// Wraps a driver error with a site tag.
    ///
    /// A server-side "operation interrupted" (code 11601, e.g. a killed
    /// long-running query) is promoted to [`SearchError::OpInterrupted`].
    pub fn from_driver(source: mongodb::error::Error, context: &'static str) -> Self {
        if let mongodb::error::ErrorKind::Command(ref command_error) = *source.kind {
            if command_error.code == OP_INTERRUPTED_CODE {
                return SearchError::OpInterrupted(format!("{context}: {}", command_error.message));
            }
        }
        SearchError::Database { context, source }
    }

    /// The HTTP status the REST layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            SearchError::Unsupported(_) => 501,
            SearchError::Invalid(_) => 400,
            SearchError::Internal(_)
            | SearchError::OpInterrupted(_)
            | SearchError::Database { .. } => 500,
        }
    }

    /// The operation-outcome issue describing this error.
    pub fn outcome_issue(&self) -> OutcomeIssue {
        let (severity, code) = match self {
            SearchError::Unsupported(_) => ("error", "not-supported"),
            SearchError::Invalid(_) => ("error", "processing"),
            SearchError::Internal(_) => ("fatal", "exception"),
            SearchError::OpInterrupted(_) => ("error", "too-costly"),
            SearchError::Database { .. } => ("fatal", "exception"),
        };
        OutcomeIssue {
            severity,
            code,
            diagnostics: self.to_string(),
        }
    }
}
