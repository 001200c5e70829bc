//! Core domain types for the minerd control plane.
//!
//! This crate provides the vocabulary shared by the web front end and the
//! daemon:
//! - `MiningInfo`: the current block as announced by the pool
//! - `HostType`: logical backends a request can be forwarded to
//! - `NonceSubmission`, `SettingsUpdate`, `PlotDirAction`: validated inputs of
//!   privileged and public actions
//! - `Miner`, `MinerServer`: the collaborator interfaces the control plane
//!   calls into

pub mod error;
pub mod host;
pub mod service;
pub mod types;

pub use error::{CoreError, Result};
pub use host::HostType;
pub use service::{Miner, MinerServer};
pub use types::{
    MinerSettings, MiningInfo, NonceOutcome, NonceSubmission, PlotCheckStatus, PlotDirAction,
    SettingsUpdate,
};
