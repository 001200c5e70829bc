//! Prometheus metrics and structured logging for minerd.
//!
//! - Structured logging with tracing (JSON, pretty or compact lines)
//! - Prometheus metrics for the web control plane: requests, logins,
//!   push clients and forwarded requests

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, ExtraLayer, LogFormat};
pub use metrics::Metrics;
