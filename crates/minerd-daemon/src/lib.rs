//! minerd daemon.
//!
//! Hosts the web control plane next to a local miner:
//! - TOML configuration with environment overrides
//! - `LocalMiner`: plot directory bookkeeping, plot checks and nonce judging
//! - `Supervisor`: shutdown and in-process restart
//! - Mining info polling of the pool backend

pub mod app;
pub mod config;
pub mod error;
pub mod miner;
pub mod poller;
pub mod supervisor;

pub use app::Application;
pub use config::{AppConfig, PoolConfig};
pub use error::{AppError, AppResult};
pub use miner::LocalMiner;
pub use supervisor::{ExitIntent, Supervisor};
