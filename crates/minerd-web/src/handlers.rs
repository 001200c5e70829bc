//! Handlers for each [`RouteDecision`](crate::route::RouteDecision) kind.

use std::path::PathBuf;

use axum::body::Bytes;
use axum::extract::{FromRequest, Query, Request};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Datelike;
use minerd_core::{NonceOutcome, NonceSubmission, PlotDirAction, SettingsUpdate};
use minerd_telemetry::Metrics;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::Credentials;
use crate::error::{WebError, WebResult};
use crate::route::{query_param, ApiAction, Page};
use crate::server::AppState;
use crate::template::{escape_html, TemplateVariables};
use crate::types::{ApiResponse, PushMessage, VersionInfo};

/// Version of this build, shown in the page footer and `/api/version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path parameter of plot directory and plot file actions.
#[derive(Debug, Deserialize)]
struct PathParam {
    path: String,
}

/// 302 to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Decode action parameters from a JSON body, a form body or the query
/// string, depending on the content type.
async fn params<T: DeserializeOwned>(req: Request) -> WebResult<T> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let Json(value) = Json::<T>::from_request(req, &())
            .await
            .map_err(|e| WebError::BadRequest(e.body_text()))?;
        Ok(value)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(value) = Form::<T>::from_request(req, &())
            .await
            .map_err(|e| WebError::BadRequest(e.body_text()))?;
        Ok(value)
    } else {
        let Query(value) =
            Query::<T>::try_from_uri(req.uri()).map_err(|e| WebError::BadRequest(e.body_text()))?;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// Variables every page sees.
fn globals(state: &AppState, logged_in: bool) -> TemplateVariables {
    let nav = match (state.auth().enabled(), logged_in) {
        (false, _) => "",
        (true, true) => r#"<a href="/logout">Logout</a>"#,
        (true, false) => r#"<a href="/login">Login</a>"#,
    };
    TemplateVariables::new()
        .with_value("TITLE", escape_html(&state.config().title))
        .with_value("VERSION", VERSION)
        .with_value("NAV_AUTH", nav)
        .with("YEAR", || chrono::Utc::now().year().to_string())
}

fn page_vars(state: &AppState, page: Page, query: Option<&str>) -> TemplateVariables {
    match page {
        Page::Dashboard => {
            let info = state.miner().current_info();
            let settings = state.miner().settings();
            let hub = state.hub().clone();
            TemplateVariables::new()
                .with_value("HEIGHT", info.height.to_string())
                .with_value("BASE_TARGET", info.base_target.to_string())
                .with_value("GENERATION_SIGNATURE", escape_html(&info.generation_signature))
                .with_value("TARGET_DEADLINE", info.target_deadline.to_string())
                .with_value("PLOT_DIR_COUNT", settings.plot_dirs.len().to_string())
                .with_value("PUSH_URL", "/ws")
                .with("PUSH_CLIENTS", move || hub.client_count().to_string())
        }
        Page::Settings => {
            let s = state.miner().settings();
            TemplateVariables::new()
                .with_value("TARGET_DEADLINE_SECS", s.target_deadline_secs.to_string())
                .with_value("BUFFER_SIZE_MB", s.buffer_size_mb.to_string())
                .with_value("MAX_PLOT_READERS", s.max_plot_readers.to_string())
                .with_value("SUBMISSION_MAX_RETRY", s.submission_max_retry.to_string())
                .with_value("TIMEOUT_SECS", s.timeout_secs.to_string())
        }
        Page::PlotFiles => {
            let dirs: String = state
                .miner()
                .settings()
                .plot_dirs
                .iter()
                .map(|d| format!("<li>{}</li>", escape_html(&d.display().to_string())))
                .collect();
            TemplateVariables::new()
                .with_value("PLOT_DIRS", dirs)
                .with_value("PUSH_URL", "/ws")
        }
        Page::Login => {
            let failed = query.and_then(|q| query_param(q, "error")).is_some();
            let error = if failed {
                r#"<p class="error">Invalid credentials</p>"#
            } else {
                ""
            };
            TemplateVariables::new().with_value("LOGIN_ERROR", error)
        }
    }
}

/// Render a page only a logged-in user may see, or redirect to the login
/// page. Nothing privileged is computed for an anonymous caller.
pub fn secured_page(state: &AppState, page: Page, jar: &CookieJar) -> WebResult<Response> {
    if !state.auth().is_logged_in(jar) {
        debug!(page = page.template(), "Anonymous request for secured page");
        return Ok(found("/login"));
    }
    render(state, page, None, true)
}

pub fn plain_page(
    state: &AppState,
    page: Page,
    query: Option<&str>,
    jar: &CookieJar,
) -> WebResult<Response> {
    let logged_in = state.auth().enabled() && state.auth().is_logged_in(jar);
    render(state, page, query, logged_in)
}

fn render(state: &AppState, page: Page, query: Option<&str>, logged_in: bool) -> WebResult<Response> {
    let html = state.templates().page(
        page.template(),
        &globals(state, logged_in),
        &page_vars(state, page, query),
    )?;
    Ok(Html(html).into_response())
}

// ---------------------------------------------------------------------------
// Login / logout
// ---------------------------------------------------------------------------

pub async fn login(state: &AppState, req: Request) -> WebResult<Response> {
    let jar = CookieJar::from_headers(req.headers());
    let Form(credentials) = Form::<Credentials>::from_request(req, &())
        .await
        .map_err(|e| WebError::BadRequest(e.body_text()))?;

    match state.auth().login(jar, &credentials) {
        Ok((jar, _session)) => Ok((jar, found("/")).into_response()),
        Err(_) => Ok(found("/login?error=1")),
    }
}

pub fn logout(state: &AppState, jar: CookieJar) -> Response {
    let jar = state.auth().logout(jar);
    (jar, found("/")).into_response()
}

// ---------------------------------------------------------------------------
// Static assets
// ---------------------------------------------------------------------------

pub async fn asset(state: &AppState, path: &str) -> WebResult<Response> {
    let asset = state.assets().resolve(path).await.ok_or(WebError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, asset.mime)], Bytes::from(asset.bytes)).into_response())
}

// ---------------------------------------------------------------------------
// API actions
// ---------------------------------------------------------------------------

/// Run a named API action.
///
/// Privileged actions check credentials before anything else; a denied
/// request never reaches the miner or the server.
pub async fn api(state: &AppState, action: ApiAction, req: Request) -> WebResult<Response> {
    if action.is_privileged() {
        let jar = CookieJar::from_headers(req.headers());
        if let Err(e) = state.auth().check_credentials(req.headers(), &jar) {
            Metrics::privileged_action(action.name(), "denied");
            warn!(action = action.name(), reason = %e, "Privileged action denied");
            return Err(e.into());
        }
    }

    match action {
        ApiAction::Settings => change_settings(state, req).await,
        ApiAction::PlotDir(dir_action) => change_plot_dir(state, dir_action, req).await,
        ApiAction::Rescan => {
            state.miner().rescan_plot_directories();
            Ok(privileged_ok(action, "rescan scheduled"))
        }
        ApiAction::PlotCheck => {
            let path = plot_path(req).await?;
            let reply = match state.miner().check_plot_file(&path) {
                Ok(()) => privileged_ok(action, "plot check scheduled"),
                Err(e) => privileged_failed(action, e),
            };
            Ok(reply)
        }
        ApiAction::PlotCheckAll => {
            state.miner().check_all_plot_files();
            Ok(privileged_ok(action, "plot check scheduled"))
        }
        ApiAction::Shutdown => {
            info!("Shutdown requested from the web interface");
            state.server().shutdown();
            Ok(privileged_ok(action, "shutting down"))
        }
        ApiAction::Restart => {
            info!("Restart requested from the web interface");
            state.server().restart();
            Ok(privileged_ok(action, "restarting"))
        }
        ApiAction::Nonce => submit_nonce(state, req).await,
        ApiAction::MiningInfo => Ok(Json(state.miner().current_info()).into_response()),
        ApiAction::Version => Ok(Json(version(state).await).into_response()),
        ApiAction::Metrics => {
            let body = Metrics::encode()?;
            Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
        }
    }
}

fn privileged_ok(action: ApiAction, message: &str) -> Response {
    Metrics::privileged_action(action.name(), "ok");
    Json(ApiResponse::ok(message)).into_response()
}

fn privileged_failed(action: ApiAction, error: impl std::fmt::Display) -> Response {
    Metrics::privileged_action(action.name(), "failed");
    warn!(action = action.name(), error = %error, "Privileged action failed");
    Json(ApiResponse::failed(error.to_string())).into_response()
}

async fn change_settings(state: &AppState, req: Request) -> WebResult<Response> {
    let update: SettingsUpdate = params(req).await?;
    if update.is_empty() {
        return Err(WebError::BadRequest("no settings given".to_string()));
    }
    update
        .validate()
        .map_err(|e| WebError::BadRequest(e.to_string()))?;

    let action = ApiAction::Settings;
    Ok(match state.miner().apply_settings(&update) {
        Ok(()) => {
            state.server().propagate_config_change();
            privileged_ok(action, "settings saved")
        }
        Err(e) => privileged_failed(action, e),
    })
}

async fn change_plot_dir(
    state: &AppState,
    dir_action: PlotDirAction,
    req: Request,
) -> WebResult<Response> {
    let path = plot_path(req).await?;
    let action = ApiAction::PlotDir(dir_action);
    Ok(match state.miner().change_plot_dir(dir_action, &path) {
        Ok(()) => {
            state.server().propagate_config_change();
            let message = match dir_action {
                PlotDirAction::Add => "plot directory added",
                PlotDirAction::Remove => "plot directory removed",
            };
            privileged_ok(action, message)
        }
        Err(e) => privileged_failed(action, e),
    })
}

async fn plot_path(req: Request) -> WebResult<PathBuf> {
    let PathParam { path } = params(req).await?;
    let path = path.trim();
    if path.is_empty() {
        return Err(WebError::BadRequest("empty path".to_string()));
    }
    Ok(PathBuf::from(path))
}

async fn submit_nonce(state: &AppState, req: Request) -> WebResult<Response> {
    let submission: NonceSubmission = params(req).await?;

    let outcome = match state.miner().submit_nonce(&submission) {
        Ok(outcome) => outcome,
        Err(e) => NonceOutcome {
            accepted: false,
            deadline: submission.deadline,
            message: e.to_string(),
        },
    };
    debug!(
        account_id = submission.account_id,
        nonce = submission.nonce,
        accepted = outcome.accepted,
        "Nonce judged"
    );

    match PushMessage::nonce_submitted(&submission, &outcome).encode() {
        Ok(json) => {
            state.hub().publish(json);
        }
        Err(e) => debug!(error = %e, "Failed to serialize nonce notification"),
    }
    Ok(Json(outcome).into_response())
}

async fn version(state: &AppState) -> VersionInfo {
    let online = match state.config().version_url.as_deref() {
        Some(url) if !url.trim().is_empty() => fetch_online_version(state, url).await,
        _ => None,
    };
    VersionInfo {
        local: VERSION.to_string(),
        online,
    }
}

async fn fetch_online_version(state: &AppState, url: &str) -> Option<String> {
    let response = state
        .proxy()
        .client()
        .get(url)
        .header(header::USER_AGENT, concat!("minerd/", env!("CARGO_PKG_VERSION")))
        .send()
        .await
        .inspect_err(|e| debug!(error = %e, "Version check failed"))
        .ok()?;
    if !response.status().is_success() {
        debug!(status = %response.status(), "Version check rejected");
        return None;
    }
    let body: serde_json::Value = response.json().await.ok()?;
    body.get("tag_name")
        .or_else(|| body.get("version"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
