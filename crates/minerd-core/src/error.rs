//! Error types for minerd-core.

use thiserror::Error;

/// Core error types.
///
/// These are failures reported by the miner collaborators for the single
/// action they were asked to perform.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Invalid plot path: {0}")]
    InvalidPlotPath(String),

    #[error("Plot directory already configured: {0}")]
    DuplicatePlotDir(String),

    #[error("Plot directory not configured: {0}")]
    UnknownPlotDir(String),

    #[error("Stale nonce: submitted for block {submitted}, current block is {current}")]
    StaleNonce { submitted: u64, current: u64 },

    #[error("Unknown host type: {0}")]
    UnknownHostType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
