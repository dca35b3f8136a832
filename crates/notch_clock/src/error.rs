//! Clock error types

use thiserror::Error;

/// Errors reported by frame clocks and frame signals
#[derive(Error, Debug)]
pub enum ClockError {
    /// The display refresh signal could not be opened
    #[error("Frame signal unavailable: {0}")]
    SignalUnavailable(String),

    /// The display refresh signal stopped delivering frames
    #[error("Frame signal lost: {0}")]
    SignalLost(String),

    /// The clock worker thread could not be spawned
    #[error("Failed to spawn clock thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type for clock operations
pub type Result<T> = std::result::Result<T, ClockError>;
