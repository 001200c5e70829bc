//! Web control plane configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use minerd_core::HostType;
use serde::{Deserialize, Serialize};

use crate::error::{WebError, WebResult};

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Page title shown in every template.
    #[serde(default = "default_title")]
    pub title: String,
    /// Root directory served under `/assets/`.
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,
    /// Directory holding the page templates.
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// Login user (empty = auth disabled).
    #[serde(default)]
    pub username: String,
    /// Login password (empty = auth disabled).
    #[serde(default)]
    pub password: String,
    /// Idle time after which a session expires.
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,
    /// Interval of the expired-session sweep (0 = lazy eviction only).
    #[serde(default = "default_session_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Pending messages kept per push client before the oldest is dropped.
    #[serde(default = "default_push_queue_capacity")]
    pub push_queue_capacity: usize,
    /// Maximum concurrent push clients.
    #[serde(default = "default_max_push_clients")]
    pub max_push_clients: usize,
    /// How often the mining info is checked for a new block.
    #[serde(default = "default_info_interval_ms")]
    pub info_interval_ms: u64,
    /// Timeout for forwarded requests.
    #[serde(default = "default_forward_timeout_secs")]
    pub forward_timeout_secs: u64,
    /// Backend addresses for forwarded requests.
    #[serde(default)]
    pub backends: BackendConfig,
    /// URL answering with the latest released version (optional).
    #[serde(default)]
    pub version_url: Option<String>,
}

/// Backend base URLs by host type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Pool base URL, e.g. `http://pool.example:8124`.
    #[serde(default)]
    pub pool: Option<String>,
    /// Wallet base URL, e.g. `http://127.0.0.1:8125`.
    #[serde(default)]
    pub wallet: Option<String>,
}

impl BackendConfig {
    /// Base URL configured for `host`, if any.
    pub fn url(&self, host: HostType) -> Option<&str> {
        let url = match host {
            HostType::Pool => self.pool.as_deref(),
            HostType::Wallet => self.wallet.as_deref(),
        };
        url.filter(|u| !u.trim().is_empty())
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8124
}

fn default_title() -> String {
    "minerd".to_string()
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_session_idle_timeout_secs() -> u64 {
    900
}

fn default_session_sweep_interval_secs() -> u64 {
    60
}

fn default_cookie_name() -> String {
    "minerd_session".to_string()
}

fn default_push_queue_capacity() -> usize {
    64
}

fn default_max_push_clients() -> usize {
    32
}

fn default_info_interval_ms() -> u64 {
    1000
}

fn default_forward_timeout_secs() -> u64 {
    10
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            title: default_title(),
            asset_dir: default_asset_dir(),
            template_dir: default_template_dir(),
            username: String::new(),
            password: String::new(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
            session_sweep_interval_secs: default_session_sweep_interval_secs(),
            cookie_name: default_cookie_name(),
            push_queue_capacity: default_push_queue_capacity(),
            max_push_clients: default_max_push_clients(),
            info_interval_ms: default_info_interval_ms(),
            forward_timeout_secs: default_forward_timeout_secs(),
            backends: BackendConfig::default(),
            version_url: None,
        }
    }
}

impl WebConfig {
    /// Check if login is required.
    pub fn auth_enabled(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }

    /// Socket address the server binds to.
    pub fn socket_addr(&self) -> WebResult<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| WebError::Config(format!("invalid bind address {}: {e}", self.bind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: WebConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.port, 8124);
        assert_eq!(config.cookie_name, "minerd_session");
        assert!(!config.auth_enabled());
    }

    #[test]
    fn test_auth_requires_both_fields() {
        let config = WebConfig {
            username: "admin".to_string(),
            ..Default::default()
        };
        assert!(!config.auth_enabled());

        let config = WebConfig {
            password: "secret".to_string(),
            ..config
        };
        assert!(config.auth_enabled());
    }

    #[test]
    fn test_blank_backend_is_unconfigured() {
        let backends = BackendConfig {
            pool: Some("  ".to_string()),
            wallet: Some("http://127.0.0.1:8125".to_string()),
        };
        assert_eq!(backends.url(HostType::Pool), None);
        assert_eq!(backends.url(HostType::Wallet), Some("http://127.0.0.1:8125"));
    }

    #[test]
    fn test_socket_addr() {
        let config = WebConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 8124);

        let config = WebConfig {
            bind: "not an address".to_string(),
            ..Default::default()
        };
        assert!(config.socket_addr().is_err());
    }
}
