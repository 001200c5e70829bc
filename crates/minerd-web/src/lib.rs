//! minerd-web - Session-gated web control plane for the mining daemon.
//!
//! This crate serves the operator UI and API of a mining rig:
//!
//! - Templated HTML pages (dashboard, settings, plot files, login)
//! - Login sessions with sliding idle expiry, or HTTP basic auth for scripts
//! - Privileged API actions calling into the [`Miner`](minerd_core::Miner)
//!   and [`MinerServer`](minerd_core::MinerServer) collaborators
//! - A WebSocket push channel fed by a non-blocking broadcast hub
//! - Verbatim forwarding of pool and wallet requests
//! - Warnings and errors relayed to the browser console
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          minerd process                           │
//! │                                                                   │
//! │  ┌──────────────┐   publish()   ┌───────────────────────────────┐ │
//! │  │  LocalMiner  │──────────────▶│ BroadcastHub (queue / client) │ │
//! │  └──────▲───────┘               └───────────────┬───────────────┘ │
//! │         │ Miner / MinerServer                   │ recv()          │
//! │  ┌──────┴───────────────────────────────────────▼───────────────┐ │
//! │  │ axum fallback: classify() ─▶ RouteDecision ─▶ handler         │ │
//! │  │   pages    ─▶ AuthGate + TemplateStore                        │ │
//! │  │   /assets  ─▶ AssetResolver                                   │ │
//! │  │   /api/*   ─▶ AuthGate (privileged) ─▶ collaborator call      │ │
//! │  │   /pool/*, /wallet/*, /burst ─▶ ForwardProxy                  │ │
//! │  │   /ws      ─▶ push client loop                                │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use minerd_web::{AppState, BroadcastHub, WebConfig, run_server};
//!
//! let config = WebConfig::default();
//! let hub = BroadcastHub::new(config.push_queue_capacity, config.max_push_clients);
//! let state = AppState::new(config, miner, server, hub)?;
//! run_server(state, shutdown.cancelled_owned()).await?;
//! ```

pub mod assets;
pub mod auth;
pub mod config;
pub mod error;
pub mod forward;
pub mod handlers;
pub mod hub;
pub mod log_relay;
pub mod route;
pub mod server;
pub mod session;
pub mod template;
pub mod ticker;
pub mod types;

pub use assets::{Asset, AssetResolver};
pub use auth::{AuthGate, Credentials};
pub use config::{BackendConfig, WebConfig};
pub use error::{AuthError, ForwardError, WebError, WebResult};
pub use forward::ForwardProxy;
pub use hub::{BroadcastHub, DeliveryState, Subscription};
pub use log_relay::LogRelay;
pub use route::{classify, ApiAction, AuthAction, Page, RouteDecision};
pub use server::{create_router, run_server, serve, AppState};
pub use session::{Clock, ManualClock, SessionStore, SessionToken, SystemClock};
pub use template::{escape_html, TemplateStore, TemplateVariables};
pub use types::{ApiResponse, PushMessage, VersionInfo};
