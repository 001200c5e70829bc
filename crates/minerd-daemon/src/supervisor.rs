//! Process lifecycle: the `MinerServer` side of the control plane.

use crate::miner::{publish, LocalMiner};
use minerd_core::{Miner, MinerServer};
use minerd_web::{BroadcastHub, PushMessage};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What the process should do once the server has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitIntent {
    Running,
    Shutdown,
    Restart,
}

/// Turns shutdown and restart requests into a cancelled token.
pub struct Supervisor {
    miner: LocalMiner,
    hub: BroadcastHub,
    token: CancellationToken,
    intent: Mutex<ExitIntent>,
}

impl Supervisor {
    pub fn new(miner: LocalMiner, hub: BroadcastHub, token: CancellationToken) -> Self {
        Self {
            miner,
            hub,
            token,
            intent: Mutex::new(ExitIntent::Running),
        }
    }

    pub fn intent(&self) -> ExitIntent {
        *self.intent.lock()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Record the first exit request and stop the server. Later requests
    /// do not change the intent.
    fn request_exit(&self, intent: ExitIntent, message: PushMessage) {
        {
            let mut current = self.intent.lock();
            if *current != ExitIntent::Running {
                debug!(requested = ?intent, current = ?*current, "Exit already requested");
                return;
            }
            *current = intent;
        }
        info!(?intent, "Stopping control plane");
        publish(&self.hub, message);
        self.token.cancel();
    }
}

impl MinerServer for Supervisor {
    fn propagate_config_change(&self) {
        publish(&self.hub, PushMessage::Config(self.miner.settings()));
    }

    fn shutdown(&self) {
        self.request_exit(ExitIntent::Shutdown, PushMessage::Shutdown);
    }

    fn restart(&self) {
        self.request_exit(ExitIntent::Restart, PushMessage::Restart);
    }
}
