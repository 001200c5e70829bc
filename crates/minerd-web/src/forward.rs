//! Request relay to the pool and wallet backends.
//!
//! The inbound method, headers and body are replayed against the backend
//! configured for the host type, and the backend's status, headers and body
//! are streamed back untouched. Connection-level headers are not relayed in
//! either direction, and the control plane's own credentials (basic auth and
//! the session cookie) never reach a backend.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use minerd_core::HostType;
use minerd_telemetry::Metrics;
use reqwest::Url;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::error::{ForwardError, WebError, WebResult};

/// Largest request body relayed to a backend.
pub const MAX_FORWARD_BODY: usize = 2 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Relays requests to the backends named in [`BackendConfig`].
#[derive(Clone)]
pub struct ForwardProxy {
    client: reqwest::Client,
    backends: BackendConfig,
    session_cookie: String,
}

impl ForwardProxy {
    /// `session_cookie` names the cookie removed from relayed requests.
    pub fn new(
        backends: &BackendConfig,
        timeout: Duration,
        session_cookie: impl Into<String>,
    ) -> WebResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebError::Config(format!("cannot build http client: {e}")))?;
        Ok(Self {
            client,
            backends: backends.clone(),
            session_cookie: session_cookie.into(),
        })
    }

    /// Shared outbound client (also used for the version check).
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Full backend URL for `path_and_query` on `host`.
    pub fn target(&self, host: HostType, path_and_query: &str) -> Result<Url, ForwardError> {
        let base = self
            .backends
            .url(host)
            .ok_or(ForwardError::NotConfigured(host))?;
        let joined = format!("{}{}", base.trim_end_matches('/'), path_and_query);
        Url::parse(&joined).map_err(|_| ForwardError::InvalidTarget(joined))
    }

    /// Replay `req` against `host` at `path_and_query`.
    pub async fn forward(
        &self,
        req: Request,
        host: HostType,
        path_and_query: &str,
    ) -> WebResult<Response> {
        let result = self.relay(req, host, path_and_query).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(WebError::Forward(ForwardError::NotConfigured(_))) => "not_configured",
            Err(_) => "failed",
        };
        Metrics::forward(host.as_str(), outcome);
        result
    }

    async fn relay(&self, req: Request, host: HostType, path_and_query: &str) -> WebResult<Response> {
        let url = self.target(host, path_and_query)?;
        let (parts, body) = req.into_parts();
        let body = to_bytes(body, MAX_FORWARD_BODY)
            .await
            .map_err(|e| WebError::BadRequest(format!("unreadable request body: {e}")))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        strip_credentials(&mut headers, &self.session_cookie);

        debug!(host = %host, url = %url, method = %parts.method, "Forwarding request");
        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|source| {
                warn!(host = %host, error = %source, "Backend unavailable");
                ForwardError::BackendUnavailable { host, source }
            })?;

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Drop `Authorization` and the `session_cookie` pair from `Cookie`,
/// keeping every other cookie.
fn strip_credentials(headers: &mut HeaderMap, session_cookie: &str) {
    headers.remove(header::AUTHORIZATION);

    let kept: Vec<String> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next().map(str::trim) != Some(session_cookie))
        .map(str::to_string)
        .collect();

    headers.remove(header::COOKIE);
    if kept.is_empty() {
        return;
    }
    match HeaderValue::from_str(&kept.join("; ")) {
        Ok(value) => {
            headers.insert(header::COOKIE, value);
        }
        Err(e) => debug!(error = %e, "Dropping unrelayable cookies"),
    }
}
