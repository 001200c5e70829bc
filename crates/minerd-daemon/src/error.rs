//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Web error: {0}")]
    Web(#[from] minerd_web::WebError),

    #[error("Miner error: {0}")]
    Miner(#[from] minerd_core::CoreError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] minerd_telemetry::TelemetryError),

    #[error("Pool error: {0}")]
    Pool(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
