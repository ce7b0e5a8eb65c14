//! Shared error type across httpscope crates.

use thiserror::Error;

/// Coarse error classes (stable, used in logs and by callers deciding
/// whether a failure is a wiring defect or a runtime fault).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Programming or configuration defect: bad config, duplicate metric,
    /// label arity mismatch. Fatal at startup or first use.
    Configuration,
    /// Anything else.
    Internal,
}

impl ErrorClass {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Configuration => "CONFIGURATION",
            ErrorClass::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, HttpScopeError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum HttpScopeError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("metric already registered: {0}")]
    DuplicateMetric(String),
    #[error("invalid metric definition: {0}")]
    InvalidMetric(String),
    #[error("label arity mismatch for {metric}: expected {expected} values, got {got}")]
    LabelArity {
        metric: String,
        expected: usize,
        got: usize,
    },
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
    #[error("metric {name} is a {actual}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("internal: {0}")]
    Internal(String),
}

impl HttpScopeError {
    /// Map an error to its class.
    pub fn class(&self) -> ErrorClass {
        match self {
            HttpScopeError::InvalidConfig(_)
            | HttpScopeError::DuplicateMetric(_)
            | HttpScopeError::InvalidMetric(_)
            | HttpScopeError::LabelArity { .. }
            | HttpScopeError::UnknownMetric(_)
            | HttpScopeError::KindMismatch { .. } => ErrorClass::Configuration,
            HttpScopeError::Internal(_) => ErrorClass::Internal,
        }
    }
}
