//! Main application orchestration.
//!
//! Wires the miner, the lifecycle supervisor and the web control plane:
//! - Push hub shared by every publisher
//! - Pool poller (when a pool backend is configured)
//! - Ctrl-C handling routed through the supervisor
//! - The HTTP server, stopped by the supervisor's token

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::miner::LocalMiner;
use crate::poller::run_pool_poller;
use crate::supervisor::{ExitIntent, Supervisor};
use minerd_core::{Miner, MinerServer};
use minerd_web::{run_server, serve, AppState, BroadcastHub, LogRelay};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Main application.
pub struct Application {
    config: AppConfig,
    hub: BroadcastHub,
    miner: LocalMiner,
    supervisor: Arc<Supervisor>,
    state: AppState,
}

impl Application {
    /// Create a new application. Fails when the web state cannot be built
    /// (e.g. a required template is missing).
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let hub = BroadcastHub::new(config.web.push_queue_capacity, config.web.max_push_clients);
        let miner = LocalMiner::new(config.miner.clone(), hub.clone());
        let supervisor = Arc::new(Supervisor::new(
            miner.clone(),
            hub.clone(),
            CancellationToken::new(),
        ));
        let state = AppState::new(
            config.web.clone(),
            Arc::new(miner.clone()),
            supervisor.clone(),
            hub.clone(),
        )?;

        Ok(Self {
            config,
            hub,
            miner,
            supervisor,
            state,
        })
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Send relayed log events to this run's push clients.
    pub fn attach_log_relay(&self, relay: &LogRelay) {
        relay.attach(self.hub.clone());
    }

    /// Run until shutdown or restart is requested, binding the configured
    /// address.
    pub async fn run(self) -> AppResult<ExitIntent> {
        let token = self.start_background_tasks();
        let state = self.state.clone();
        run_server(state, token.cancelled_owned()).await?;
        Ok(self.finish())
    }

    /// Same as [`run`](Self::run) on an already bound listener.
    pub async fn run_on(self, listener: TcpListener) -> AppResult<ExitIntent> {
        let token = self.start_background_tasks();
        let state = self.state.clone();
        serve(listener, state, token.cancelled_owned()).await?;
        Ok(self.finish())
    }

    fn start_background_tasks(&self) -> CancellationToken {
        let token = self.supervisor.token().clone();

        if let Some(pool) = self.config.web.backends.pool.clone().filter(|p| !p.trim().is_empty()) {
            tokio::spawn(run_pool_poller(
                self.state.proxy().client().clone(),
                pool,
                self.miner.clone(),
                self.config.pool.poll_interval(),
                token.clone(),
            ));
        } else {
            info!("No pool backend configured, mining info will not be polled");
        }

        let supervisor = self.supervisor.clone();
        let signal_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => {
                            info!("Received Ctrl+C, shutting down...");
                            supervisor.shutdown();
                        }
                        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
                    }
                }
                _ = signal_token.cancelled() => {}
            }
        });

        self.miner.rescan_plot_directories();
        token
    }

    fn finish(self) -> ExitIntent {
        // Stops the poller and the signal task if the server ended on its own.
        self.supervisor.token().cancel();
        let intent = match self.supervisor.intent() {
            ExitIntent::Running => ExitIntent::Shutdown,
            intent => intent,
        };
        info!(?intent, plot_dirs = self.miner.settings().plot_dirs.len(), "Control plane stopped");
        intent
    }
}
