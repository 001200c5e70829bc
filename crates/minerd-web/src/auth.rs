//! Authentication gate.
//!
//! Browsers authenticate once through the login form and then present the
//! session cookie. Scripts may instead send HTTP basic auth on every API
//! call. When no username or password is configured every check passes.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use minerd_telemetry::Metrics;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::config::WebConfig;
use crate::error::AuthError;
use crate::session::{Session, SessionStore, SessionToken};

/// Credentials posted by the login form.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"***")
            .finish()
    }
}

/// Decides whether a request may see privileged pages or run privileged
/// actions.
pub struct AuthGate {
    sessions: Arc<SessionStore>,
    username: String,
    password: String,
    cookie_name: String,
}

impl AuthGate {
    pub fn new(config: &WebConfig, sessions: Arc<SessionStore>) -> Self {
        Self {
            sessions,
            username: config.username.clone(),
            password: config.password.clone(),
            cookie_name: config.cookie_name.clone(),
        }
    }

    /// Whether credentials are configured at all.
    pub fn enabled(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Compare credentials against the configured secret.
    ///
    /// Both fields are always compared so the timing does not reveal which
    /// one was wrong.
    pub fn verify(&self, user: &str, pass: &str) -> bool {
        let user_ok = user.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = pass.as_bytes().ct_eq(self.password.as_bytes());
        bool::from(user_ok & pass_ok)
    }

    /// Log in and attach a fresh session cookie to `jar`.
    ///
    /// An existing session of the requester is replaced.
    pub fn login(
        &self,
        jar: CookieJar,
        credentials: &Credentials,
    ) -> Result<(CookieJar, Session), AuthError> {
        if self.enabled() && !self.verify(&credentials.user, &credentials.pass) {
            Metrics::login_attempt(false);
            warn!(user = %credentials.user, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let previous = self.token(&jar);
        let session = self.sessions.create(previous.as_ref());
        Metrics::login_attempt(true);
        info!(user = %credentials.user, "Login succeeded");

        let cookie = Cookie::build((self.cookie_name.clone(), session.token.as_str().to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict);
        Ok((jar.add(cookie), session))
    }

    /// Whether the request carries a valid session. Refreshes it if so.
    pub fn is_logged_in(&self, jar: &CookieJar) -> bool {
        if !self.enabled() {
            return true;
        }
        self.session_status(jar).is_ok()
    }

    /// Like [`is_logged_in`](Self::is_logged_in), but tells an expired
    /// session apart from a missing one.
    pub fn session_status(&self, jar: &CookieJar) -> Result<(), AuthError> {
        match self.token(jar) {
            None => Err(AuthError::InvalidCredentials),
            Some(token) if self.sessions.touch(&token) => Ok(()),
            Some(_) => Err(AuthError::SessionExpired),
        }
    }

    /// Drop the requester's session and clear the cookie. Idempotent.
    pub fn logout(&self, jar: CookieJar) -> CookieJar {
        if let Some(token) = self.token(&jar) {
            if self.sessions.remove(&token) {
                info!("Logged out");
            }
        }
        jar.remove(Cookie::build((self.cookie_name.clone(), "")).path("/"))
    }

    /// Gate for privileged API actions: a valid session or matching basic
    /// auth credentials.
    pub fn check_credentials(&self, headers: &HeaderMap, jar: &CookieJar) -> Result<(), AuthError> {
        if !self.enabled() {
            return Ok(());
        }
        if let Some((user, pass)) = basic_auth(headers) {
            return if self.verify(&user, &pass) {
                Ok(())
            } else {
                Err(AuthError::InvalidCredentials)
            };
        }
        self.session_status(jar)
    }

    fn token(&self, jar: &CookieJar) -> Option<SessionToken> {
        jar.get(&self.cookie_name)
            .map(|c| c.value())
            .filter(|v| !v.is_empty())
            .map(SessionToken::from)
    }
}

/// Extract `user:pass` from an `Authorization: Basic ...` header.
fn basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}
