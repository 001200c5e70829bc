//! Collaborator interfaces called by the control plane.
//!
//! Implementations live in the daemon; the web crate only ever sees these
//! traits, which keeps request handling testable with doubles.

use crate::error::Result;
use crate::types::{
    MinerSettings, MiningInfo, NonceOutcome, NonceSubmission, PlotDirAction, SettingsUpdate,
};
use std::path::Path;

/// The mining engine.
///
/// Every method must return promptly. Disk-bound work (rescans, plot checks)
/// is scheduled by the implementation and its completion is reported through
/// the push channel, not through the return value.
pub trait Miner: Send + Sync {
    /// Current block information.
    fn current_info(&self) -> MiningInfo;

    /// Snapshot of the current tunables and plot directories.
    fn settings(&self) -> MinerSettings;

    /// Apply a validated settings change atomically.
    fn apply_settings(&self, update: &SettingsUpdate) -> Result<()>;

    /// Add or remove a plot directory.
    fn change_plot_dir(&self, action: PlotDirAction, path: &Path) -> Result<()>;

    /// Schedule a rescan of every plot directory.
    fn rescan_plot_directories(&self);

    /// Schedule a corruption check of a single plot file.
    ///
    /// Fails only when the check cannot be scheduled (e.g. the file is not
    /// inside a configured plot directory).
    fn check_plot_file(&self, path: &Path) -> Result<()>;

    /// Schedule a corruption check of every known plot file.
    fn check_all_plot_files(&self);

    /// Judge a nonce found for the current (or given) block.
    fn submit_nonce(&self, submission: &NonceSubmission) -> Result<NonceOutcome>;
}

/// The process hosting the miner and the control plane.
pub trait MinerServer: Send + Sync {
    /// Tell connected clients that the configuration changed.
    fn propagate_config_change(&self);

    /// Stop the process after in-flight responses are sent.
    fn shutdown(&self);

    /// Restart the application in-process.
    fn restart(&self);
}
