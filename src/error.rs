//! Error types for the mixture estimation engine

use thiserror::Error;

/// Result type alias for mixture operations
pub type Result<T> = std::result::Result<T, MixtureError>;

/// Main error type for the mixture engine
#[derive(Error, Debug)]
pub enum MixtureError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Numeric degeneracy: {context}")]
    NumericDegeneracy { context: String },

    #[error("Fit failed: all {attempts} attempts were degenerate (last: {reason})")]
    FitFailed { attempts: usize, reason: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl MixtureError {
    pub(crate) fn degenerate(context: impl Into<String>) -> Self {
        MixtureError::NumericDegeneracy {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_parameter(
        name: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        MixtureError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        MixtureError::ShapeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Prefix the context of a degeneracy; other variants pass through.
    pub(crate) fn within(self, scope: impl std::fmt::Display) -> Self {
        match self {
            MixtureError::NumericDegeneracy { context } => MixtureError::NumericDegeneracy {
                context: format!("{}: {}", scope, context),
            },
            other => other,
        }
    }

    /// Whether this failure is confined to one initialization attempt.
    ///
    /// Degenerate attempts are discarded by the multi-start search; every
    /// other error aborts the fit.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, MixtureError::NumericDegeneracy { .. })
    }
}

impl From<serde_json::Error> for MixtureError {
    fn from(err: serde_json::Error) -> Self {
        MixtureError::SerializationError(err.to_string())
    }
}
