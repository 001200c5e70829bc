//! Mock pool server for integration tests.
//!
//! Provides a simple HTTP server that can:
//! - Answer `getMiningInfo` with a block set by the test
//! - Count the requests it received

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

#[derive(Clone)]
struct PoolState {
    info: Arc<Mutex<serde_json::Value>>,
    requests: Arc<AtomicU32>,
}

/// A mock pool for testing.
pub struct MockPool {
    addr: SocketAddr,
    state: PoolState,
    shutdown_tx: oneshot::Sender<()>,
}

impl MockPool {
    /// Start a mock pool on an available port announcing block `height`.
    pub async fn start(height: u64) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = PoolState {
            info: Arc::new(Mutex::new(block(height))),
            requests: Arc::new(AtomicU32::new(0)),
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route("/burst", get(burst))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    /// Base URL to configure as the pool backend.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Announce a new block.
    pub async fn set_height(&self, height: u64) {
        *self.state.info.lock().await = block(height);
    }

    /// Number of requests received.
    pub fn request_count(&self) -> u32 {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Shutdown the server.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn block(height: u64) -> serde_json::Value {
    serde_json::json!({
        "height": height.to_string(),
        "baseTarget": "70312",
        "generationSignature": format!("{height:064x}"),
        "targetDeadline": 86400
    })
}

async fn burst(
    State(state): State<PoolState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    match params.get("requestType").map(String::as_str) {
        Some("getMiningInfo") => Json(state.info.lock().await.clone()).into_response(),
        _ => (StatusCode::BAD_REQUEST, "unsupported requestType").into_response(),
    }
}
