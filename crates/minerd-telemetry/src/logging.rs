//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use std::str::FromStr;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,minerd=debug,tower_http=info";

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "MINERD_LOG_FORMAT";

/// Additional layer installed next to the formatter (e.g. a relay to the UI).
pub type ExtraLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output, for terminals on the rig.
    Compact,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(TelemetryError::LoggingInit(format!(
                "unknown log format: {other}"
            ))),
        }
    }
}

impl LogFormat {
    /// `MINERD_LOG_FORMAT` if set, else JSON when `RUST_ENV=production`,
    /// else pretty.
    pub fn from_env() -> TelemetryResult<Self> {
        Self::resolve(
            std::env::var(LOG_FORMAT_ENV).ok().as_deref(),
            std::env::var("RUST_ENV").ok().as_deref(),
        )
    }

    fn resolve(format: Option<&str>, rust_env: Option<&str>) -> TelemetryResult<Self> {
        match format {
            Some(f) if !f.trim().is_empty() => f.parse(),
            _ if rust_env == Some("production") => Ok(Self::Json),
            _ => Ok(Self::Pretty),
        }
    }
}

/// Initialize structured logging from the environment.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with(LogFormat::from_env()?, None)
}

/// Initialize structured logging with an explicit format and an optional
/// extra layer. `RUST_LOG` still overrides the default filter, and the
/// filter applies to the extra layer too.
pub fn init_logging_with(format: LogFormat, extra: Option<ExtraLayer>) -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(extra).with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true).with_thread_names(true))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
