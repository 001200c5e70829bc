//! Common data types exchanged between the miner and the control plane.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Current block information as announced by the pool.
///
/// Field names follow the pool's `getMiningInfo` JSON so the struct can be
/// served verbatim to other miners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningInfo {
    #[serde(deserialize_with = "lenient_u64")]
    pub height: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub base_target: u64,
    pub generation_signature: String,
    /// Deadline limit in seconds (0 = pool does not announce one).
    #[serde(default, deserialize_with = "lenient_u64")]
    pub target_deadline: u64,
}

impl MiningInfo {
    /// Whether `other` describes a different block than `self`.
    pub fn is_new_block(&self, other: &MiningInfo) -> bool {
        self.height != other.height || self.generation_signature != other.generation_signature
    }
}

/// Pools disagree on whether numbers are sent as JSON numbers or strings.
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(u64),
    Str(String),
}

/// A nonce found by a miner, submitted through the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceSubmission {
    #[serde(deserialize_with = "lenient_u64")]
    pub account_id: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub nonce: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub deadline: u64,
    /// Block the nonce was found for. `None` means the current block.
    #[serde(default, rename = "blockheight", deserialize_with = "lenient_opt")]
    pub block_height: Option<u64>,
    #[serde(default, rename = "plotfile")]
    pub plot_file: Option<String>,
}

fn lenient_opt<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = match Option::<NumOrStr>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(NumOrStr::Num(n)) => n.to_string(),
        Some(NumOrStr::Str(s)) => s,
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(serde::de::Error::custom)
}

/// Verdict on a submitted nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceOutcome {
    pub accepted: bool,
    pub deadline: u64,
    pub message: String,
}

/// Tunables of the miner that can be changed from the settings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerSettings {
    /// Highest deadline (seconds) worth submitting.
    #[serde(default = "default_target_deadline_secs")]
    pub target_deadline_secs: u64,
    /// Read buffer per plot reader, in megabytes.
    #[serde(default = "default_buffer_size_mb")]
    pub buffer_size_mb: u64,
    /// Number of concurrent plot readers (0 = one per directory).
    #[serde(default)]
    pub max_plot_readers: u32,
    /// Retries for a failed nonce submission.
    #[serde(default = "default_submission_max_retry")]
    pub submission_max_retry: u32,
    /// Timeout for pool requests, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directories scanned for plot files.
    #[serde(default)]
    pub plot_dirs: Vec<PathBuf>,
}

fn default_target_deadline_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_buffer_size_mb() -> u64 {
    256
}

fn default_submission_max_retry() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for MinerSettings {
    fn default() -> Self {
        Self {
            target_deadline_secs: default_target_deadline_secs(),
            buffer_size_mb: default_buffer_size_mb(),
            max_plot_readers: 0,
            submission_max_retry: default_submission_max_retry(),
            timeout_secs: default_timeout_secs(),
            plot_dirs: Vec::new(),
        }
    }
}

/// A partial change of `MinerSettings` posted from the settings page.
///
/// Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default, deserialize_with = "lenient_opt")]
    pub target_deadline_secs: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub buffer_size_mb: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub max_plot_readers: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub submission_max_retry: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub timeout_secs: Option<u64>,
}

impl SettingsUpdate {
    /// True when the update would not change anything.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Check every field before anything is applied.
    pub fn validate(&self) -> Result<()> {
        if self.target_deadline_secs == Some(0) {
            return Err(CoreError::InvalidSetting(
                "target_deadline_secs must be positive".to_string(),
            ));
        }
        if self.buffer_size_mb == Some(0) {
            return Err(CoreError::InvalidSetting(
                "buffer_size_mb must be positive".to_string(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(CoreError::InvalidSetting(
                "timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate, then write every present field into `settings`.
    ///
    /// On error `settings` is left untouched.
    pub fn apply_to(&self, settings: &mut MinerSettings) -> Result<()> {
        self.validate()?;
        if let Some(v) = self.target_deadline_secs {
            settings.target_deadline_secs = v;
        }
        if let Some(v) = self.buffer_size_mb {
            settings.buffer_size_mb = v;
        }
        if let Some(v) = self.max_plot_readers {
            settings.max_plot_readers = v;
        }
        if let Some(v) = self.submission_max_retry {
            settings.submission_max_retry = v;
        }
        if let Some(v) = self.timeout_secs {
            settings.timeout_secs = v;
        }
        Ok(())
    }
}

/// Add or remove a plot directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotDirAction {
    Add,
    Remove,
}

impl fmt::Display for PlotDirAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Result of checking a single plot file for corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotCheckStatus {
    Intact,
    Corrupted,
    Unreadable,
}
