//! Error types for the pool core
//!
//! Library-level failures (configuration, template decoding, coinbase splitting) use
//! the [`Error`] enum below. Per-submission outcomes are not errors in this sense:
//! see [`crate::stratum::ShareError`] and [`crate::core::CycleError`].

use crate::transaction::BuildError;
use thiserror::Error;

/// Main error type for the pool core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML rendering errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed block template
    #[error("Invalid block template: {0}")]
    InvalidTemplate(String),

    /// Malformed hex input
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Generation transaction could not be built
    #[error("Generation transaction error: {0}")]
    Build(#[from] BuildError),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for the pool core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid template error
    pub fn invalid_template(msg: impl Into<String>) -> Self {
        Self::InvalidTemplate(msg.into())
    }

    /// Create an invalid hex error
    pub fn invalid_hex(msg: impl Into<String>) -> Self {
        Self::InvalidHex(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
