//! Web control plane error types.
//!
//! `WebError` is the only place where failures are turned into HTTP
//! responses. Bodies are deliberately uniform: a client cannot tell a blocked
//! traversal from a missing file, or a wrong user from a wrong password.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use minerd_core::HostType;
use thiserror::Error;
use tracing::{error, warn};

use crate::types::ApiResponse;

/// Authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("session expired")]
    SessionExpired,
}

/// Forwarding failures.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no backend configured for {0}")]
    NotConfigured(HostType),

    #[error("invalid target url {0}")]
    InvalidTarget(String),

    #[error("backend {host} unavailable: {source}")]
    BackendUnavailable {
        host: HostType,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors surfaced by request handling.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forward error: {0}")]
    Forward(#[from] ForwardError),

    #[error("Too many push clients")]
    PushClientsExhausted,

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] minerd_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WebResult<T> = Result<T, WebError>;

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::Auth(_) => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"minerd\"")],
                Json(ApiResponse::failed("unauthorized")),
            )
                .into_response(),
            WebError::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            WebError::BadRequest(reason) => {
                warn!(reason = %reason, "Rejected malformed request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::failed("bad request")),
                )
                    .into_response()
            }
            WebError::Forward(e) => {
                warn!(error = %e, "Forwarding failed");
                (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
            }
            WebError::PushClientsExhausted => {
                (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response()
            }
            e @ (WebError::Template(_)
            | WebError::Config(_)
            | WebError::Telemetry(_)
            | WebError::Io(_)) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (WebError::Auth(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (WebError::Auth(AuthError::SessionExpired), StatusCode::UNAUTHORIZED),
            (WebError::NotFound, StatusCode::NOT_FOUND),
            (WebError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                WebError::Forward(ForwardError::NotConfigured(HostType::Pool)),
                StatusCode::BAD_GATEWAY,
            ),
            (WebError::Template("gone".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
