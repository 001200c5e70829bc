//! Control plane API types.
//!
//! These types are used for JSON serialization in REST responses and on the
//! push channel.

use minerd_core::{MinerSettings, MiningInfo, NonceOutcome, NonceSubmission, PlotCheckStatus};
use serde::{Deserialize, Serialize};

/// Generic JSON reply of an API action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Local and latest released version.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub local: String,
    pub online: Option<String>,
}

/// Push channel message types (tagged enum for type safety).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// Current block (sent on connect and on every new block).
    MiningInfo(MiningInfo),
    /// Current miner settings (sent on connect and after every change).
    Config(MinerSettings),
    /// A nonce went through the control plane.
    NonceSubmitted {
        account_id: u64,
        nonce: u64,
        deadline: u64,
        accepted: bool,
    },
    /// Result of a single plot file check.
    PlotCheck {
        path: String,
        status: PlotCheckStatus,
        detail: String,
    },
    /// A full plot check finished.
    PlotCheckAllDone { checked: usize, corrupted: usize },
    /// A plot directory rescan finished.
    RescanDone { plot_files: usize, total_bytes: u64 },
    /// The process is going down.
    Shutdown,
    /// The process is restarting.
    Restart,
    /// Free-form log line for the browser console.
    Log { level: String, message: String },
}

impl PushMessage {
    /// Build the notification for a judged nonce.
    pub fn nonce_submitted(submission: &NonceSubmission, outcome: &NonceOutcome) -> Self {
        Self::NonceSubmitted {
            account_id: submission.account_id,
            nonce: submission.nonce,
            deadline: outcome.deadline,
            accepted: outcome.accepted,
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
