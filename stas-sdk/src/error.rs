//! SDK error types.

use stas_tokens::{ServiceError, TokenError};

/// Errors raised by the SDK facade.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Settings could not be loaded or deserialized.
    #[error("settings: {0}")]
    Settings(#[from] config::ConfigError),

    /// Settings loaded but hold an unusable value.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Token error.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Service error.
    #[error(transparent)]
    Service(#[from] ServiceError),
}
