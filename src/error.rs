//! Error types for pvclearsky

use thiserror::Error;

/// Failures raised while validating input, resolving times or rendering.
///
/// The irradiance math has no failure modes of its own; everything except
/// `Output` describes bad input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PvError {
    #[error("Invalid {name}: {value} ({reason})")]
    InvalidInput { name: &'static str, value: String, reason: String },

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Failed to render output: {0}")]
    Output(String),
}

impl PvError {
    pub fn invalid(name: &'static str, value: f64, reason: impl Into<String>) -> Self {
        PvError::InvalidInput { name, value: value.to_string(), reason: reason.into() }
    }
}

/// Result type alias for pvclearsky operations
pub type Result<T> = std::result::Result<T, PvError>;
