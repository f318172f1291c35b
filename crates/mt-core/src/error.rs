//! Error types for the time-span engine

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Division by zero")]
    DivideByZero,

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Invalid time span format: {0:?}")]
    Format(String),

    #[error("Unsupported conversion: {0}")]
    UnsupportedConversion(String),
}

/// Result type alias
pub type TimeResult<T> = Result<T, TimeError>;
