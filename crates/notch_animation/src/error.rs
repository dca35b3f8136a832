//! Animation error types
//!
//! The animation path itself never fails: bad levels are clamped or
//! ignored. Errors only come out of setup, when loading configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for `AnimatorConfig`
    #[error("Failed to parse animator config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered back to TOML
    #[error("Failed to serialize animator config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of its allowed range
    #[error("Invalid animator config: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
