//! Application configuration.

use crate::error::{AppError, AppResult};
use minerd_core::MinerSettings;
use minerd_web::WebConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file used when neither `--config` nor `MINERD_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "MINERD_CONFIG";

/// Environment variable overriding `web.password`.
pub const PASSWORD_ENV: &str = "MINERD_WEB_PASSWORD";

/// Pool polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// How often the pool is asked for the current block (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PoolConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web control plane.
    #[serde(default)]
    pub web: WebConfig,
    /// Initial miner tunables and plot directories.
    #[serde(default)]
    pub miner: MinerSettings,
    /// Pool polling.
    #[serde(default)]
    pub pool: PoolConfig,
}

impl AppConfig {
    /// Resolve the config path (`explicit` > `MINERD_CONFIG` > default) and
    /// load it. A missing file yields the defaults.
    pub fn load(explicit: Option<&str>) -> AppResult<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok();
        let config_path = resolve_path(explicit, env_path.as_deref());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_password_override(std::env::var(PASSWORD_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Replace the web password with `password` when it is set.
    pub fn apply_password_override(&mut self, password: Option<String>) {
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            self.web.password = password;
        }
    }

    /// Reject values that would make the daemon misbehave.
    pub fn validate(&self) -> AppResult<()> {
        if self.pool.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "pool.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.web.push_queue_capacity == 0 {
            return Err(AppError::Config(
                "web.push_queue_capacity must be positive".to_string(),
            ));
        }
        if self.web.session_idle_timeout_secs == 0 {
            return Err(AppError::Config(
                "web.session_idle_timeout_secs must be positive".to_string(),
            ));
        }
        if self.web.username.is_empty() != self.web.password.is_empty() {
            return Err(AppError::Config(
                "web.username and web.password must be set together".to_string(),
            ));
        }
        self.web
            .socket_addr()
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(())
    }
}

fn resolve_path(explicit: Option<&str>, env: Option<&str>) -> String {
    explicit
        .or(env)
        .unwrap_or(DEFAULT_CONFIG_PATH)
        .to_string()
}
