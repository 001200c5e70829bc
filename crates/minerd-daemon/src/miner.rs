//! Local `Miner` implementation.
//!
//! Keeps the current block and the tunables behind a single lock and runs
//! disk-bound plot maintenance on blocking tasks. Results are reported to the
//! browser through the push hub.

use minerd_core::{
    CoreError, Miner, MinerSettings, MiningInfo, NonceOutcome, NonceSubmission, PlotCheckStatus,
    PlotDirAction, Result, SettingsUpdate,
};
use minerd_web::{BroadcastHub, PushMessage};
use parking_lot::Mutex;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bytes one nonce occupies in a plot file.
pub const BYTES_PER_NONCE: u64 = 262_144;

/// Parsed `<account>_<start>_<nonces>[_<stagger>]` file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotName {
    pub account_id: u64,
    pub start_nonce: u64,
    pub nonces: u64,
}

impl PlotName {
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        if !(3..=4).contains(&parts.len()) {
            return None;
        }
        let mut numbers = parts.iter().map(|p| p.parse::<u64>().ok());
        let account_id = numbers.next()??;
        let start_nonce = numbers.next()??;
        let nonces = numbers.next()??;
        // The optional stagger must still be numeric.
        if let Some(stagger) = numbers.next() {
            stagger?;
        }
        Some(Self {
            account_id,
            start_nonce,
            nonces,
        })
    }

    pub fn expected_size(&self) -> u64 {
        self.nonces.saturating_mul(BYTES_PER_NONCE)
    }
}

/// Check one plot file on disk.
pub fn check_file(path: &Path) -> (PlotCheckStatus, String) {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return (PlotCheckStatus::Corrupted, "file name is not UTF-8".to_string());
    };
    let Some(plot) = PlotName::parse(name) else {
        return (PlotCheckStatus::Corrupted, "not a plot file name".to_string());
    };
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => return (PlotCheckStatus::Unreadable, e.to_string()),
    };
    if size == plot.expected_size() {
        (PlotCheckStatus::Intact, format!("{} nonces", plot.nonces))
    } else {
        (
            PlotCheckStatus::Corrupted,
            format!("size {size} bytes, expected {}", plot.expected_size()),
        )
    }
}

/// Plot files (by name) directly inside `dirs`, with their sizes.
pub fn list_plot_files(dirs: &[PathBuf]) -> Vec<(PathBuf, u64)> {
    let mut files = Vec::new();
    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read plot directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_plot = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(PlotName::parse)
                .is_some();
            if !is_plot {
                continue;
            }
            match entry.metadata() {
                Ok(meta) if meta.is_file() => files.push((path, meta.len())),
                Ok(_) => {}
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping plot file"),
            }
        }
    }
    files.sort();
    files
}

/// Encode `message` and hand it to every push client.
pub fn publish(hub: &BroadcastHub, message: PushMessage) {
    match message.encode() {
        Ok(text) => {
            hub.publish(text);
        }
        Err(e) => warn!(error = %e, "Failed to encode push message"),
    }
}

struct MinerState {
    info: MiningInfo,
    settings: MinerSettings,
}

struct Inner {
    state: Mutex<MinerState>,
    hub: BroadcastHub,
}

/// Miner state shared by the web control plane and the pool poller.
#[derive(Clone)]
pub struct LocalMiner {
    inner: Arc<Inner>,
}

impl LocalMiner {
    pub fn new(settings: MinerSettings, hub: BroadcastHub) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MinerState {
                    info: MiningInfo::default(),
                    settings,
                }),
                hub,
            }),
        }
    }

    /// Replace the current block. Returns true when it is a new block.
    pub fn set_info(&self, info: MiningInfo) -> bool {
        let mut state = self.inner.state.lock();
        let is_new = state.info.is_new_block(&info);
        if is_new {
            info!(
                height = info.height,
                base_target = info.base_target,
                "New block"
            );
        }
        state.info = info;
        is_new
    }

    fn plot_dirs(&self) -> Vec<PathBuf> {
        self.inner.state.lock().settings.plot_dirs.clone()
    }

    fn hub(&self) -> BroadcastHub {
        self.inner.hub.clone()
    }
}

impl Miner for LocalMiner {
    fn current_info(&self) -> MiningInfo {
        self.inner.state.lock().info.clone()
    }

    fn settings(&self) -> MinerSettings {
        self.inner.state.lock().settings.clone()
    }

    fn apply_settings(&self, update: &SettingsUpdate) -> Result<()> {
        let mut state = self.inner.state.lock();
        let mut next = state.settings.clone();
        update.apply_to(&mut next)?;
        state.settings = next;
        info!(?update, "Settings applied");
        Ok(())
    }

    fn change_plot_dir(&self, action: PlotDirAction, path: &Path) -> Result<()> {
        // Disk is only touched outside the state lock.
        if action == PlotDirAction::Add && !path.is_dir() {
            return Err(CoreError::InvalidPlotPath(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        {
            let mut state = self.inner.state.lock();
            let dirs = &mut state.settings.plot_dirs;
            match action {
                PlotDirAction::Add => {
                    if dirs.iter().any(|d| d == path) {
                        return Err(CoreError::DuplicatePlotDir(path.display().to_string()));
                    }
                    dirs.push(path.to_path_buf());
                }
                PlotDirAction::Remove => {
                    let Some(index) = dirs.iter().position(|d| d == path) else {
                        return Err(CoreError::UnknownPlotDir(path.display().to_string()));
                    };
                    dirs.remove(index);
                }
            }
        }
        info!(%action, dir = %path.display(), "Plot directory changed");
        self.rescan_plot_directories();
        Ok(())
    }

    fn rescan_plot_directories(&self) {
        let dirs = self.plot_dirs();
        let hub = self.hub();
        tokio::task::spawn_blocking(move || {
            let files = list_plot_files(&dirs);
            let total_bytes = files.iter().map(|(_, size)| size).sum();
            info!(plot_files = files.len(), total_bytes, "Plot directories rescanned");
            publish(
                &hub,
                PushMessage::RescanDone {
                    plot_files: files.len(),
                    total_bytes,
                },
            );
        });
    }

    fn check_plot_file(&self, path: &Path) -> Result<()> {
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(CoreError::InvalidPlotPath(path.display().to_string()));
        }
        if !self.plot_dirs().iter().any(|dir| path.starts_with(dir)) {
            return Err(CoreError::InvalidPlotPath(format!(
                "{} is not inside a plot directory",
                path.display()
            )));
        }

        let path = path.to_path_buf();
        let hub = self.hub();
        tokio::task::spawn_blocking(move || {
            let (status, detail) = check_file(&path);
            debug!(path = %path.display(), ?status, "Plot file checked");
            publish(
                &hub,
                PushMessage::PlotCheck {
                    path: path.display().to_string(),
                    status,
                    detail,
                },
            );
        });
        Ok(())
    }

    fn check_all_plot_files(&self) {
        let dirs = self.plot_dirs();
        let hub = self.hub();
        tokio::task::spawn_blocking(move || {
            let files = list_plot_files(&dirs);
            let mut corrupted = 0;
            for (path, _) in &files {
                let (status, detail) = check_file(path);
                if status != PlotCheckStatus::Intact {
                    corrupted += 1;
                    warn!(path = %path.display(), ?status, %detail, "Plot file check failed");
                }
                publish(
                    &hub,
                    PushMessage::PlotCheck {
                        path: path.display().to_string(),
                        status,
                        detail,
                    },
                );
            }
            info!(checked = files.len(), corrupted, "Plot check finished");
            publish(
                &hub,
                PushMessage::PlotCheckAllDone {
                    checked: files.len(),
                    corrupted,
                },
            );
        });
    }

    fn submit_nonce(&self, submission: &NonceSubmission) -> Result<NonceOutcome> {
        let state = self.inner.state.lock();
        let current = state.info.height;
        if let Some(submitted) = submission.block_height {
            if submitted != current {
                return Err(CoreError::StaleNonce { submitted, current });
            }
        }

        let deadline = submission.deadline;
        let pool_limit = state.info.target_deadline;
        let (accepted, message) = if deadline > state.settings.target_deadline_secs {
            (false, "deadline exceeds the miner's target deadline")
        } else if pool_limit != 0 && deadline > pool_limit {
            (false, "deadline exceeds the pool's target deadline")
        } else {
            (true, "deadline accepted")
        };
        debug!(
            account_id = submission.account_id,
            nonce = submission.nonce,
            deadline,
            accepted,
            "Nonce judged"
        );

        Ok(NonceOutcome {
            accepted,
            deadline,
            message: message.to_string(),
        })
    }
}
