//! Push channel integration tests.
//!
//! Runs the server on a real listener and connects tokio-tungstenite
//! clients:
//! - Welcome messages on connect
//! - Per-client FIFO delivery to several clients
//! - Deregistration on disconnect and the client limit

mod integration;
use integration::common::fixture::{state, Site};
use integration::common::mocks::{quiet_rig, MockHost};

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use minerd_web::{serve, AppState, BroadcastHub, WebConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Running {
    addr: SocketAddr,
    hub: BroadcastHub,
    shutdown: Option<oneshot::Sender<()>>,
    _site: Site,
}

impl Running {
    async fn start(configure: impl FnOnce(&mut WebConfig)) -> Self {
        let site = Site::new();
        let mut config = site.config(false);
        // Keep the ticker out of the way after its first tick
        config.info_interval_ms = 3_600_000;
        configure(&mut config);

        let state: AppState = state(config, quiet_rig(), MockHost::new());
        let hub = state.hub().clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(serve(listener, state, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            hub,
            shutdown: Some(tx),
            _site: site,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    async fn connect(&self) -> Client {
        let (client, _) = connect_async(self.url()).await.unwrap();
        client
    }

    async fn wait_for_clients(&self, n: usize) {
        timeout(Duration::from_secs(2), async {
            while self.hub.client_count() != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {n} push clients"));
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("message within timeout")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = msg {
            return text.to_string();
        }
    }
}

/// Next message that is not a periodic mining info update.
async fn next_published(client: &mut Client) -> String {
    loop {
        let text = next_text(client).await;
        if !text.contains("\"type\":\"mining_info\"") {
            return text;
        }
    }
}

#[tokio::test]
async fn test_welcome_replays_config_and_mining_info() {
    let server = Running::start(|_| {}).await;
    let mut client = server.connect().await;

    let first = next_text(&mut client).await;
    assert!(first.contains("\"type\":\"config\""));
    let second = next_text(&mut client).await;
    assert!(second.contains("\"type\":\"mining_info\""));
    assert!(second.contains("\"height\":1234"));
}

#[tokio::test]
async fn test_two_clients_receive_messages_in_order() {
    let server = Running::start(|_| {}).await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    server.wait_for_clients(2).await;

    for client in [&mut a, &mut b] {
        next_text(client).await; // config
    }

    server.hub.publish("M1");
    server.hub.publish("M2");

    for client in [&mut a, &mut b] {
        assert_eq!(next_published(client).await, "M1");
        assert_eq!(next_published(client).await, "M2");
    }
}

#[tokio::test]
async fn test_disconnect_deregisters_client() {
    let server = Running::start(|_| {}).await;
    let mut a = server.connect().await;
    let b = server.connect().await;
    server.wait_for_clients(2).await;

    a.close(None).await.unwrap();
    drop(a);
    server.wait_for_clients(1).await;

    drop(b);
    server.wait_for_clients(0).await;
}

#[tokio::test]
async fn test_client_limit_returns_503() {
    let server = Running::start(|c| c.max_push_clients = 1).await;
    let _first = server.connect().await;
    server.wait_for_clients(1).await;

    match connect_async(server.url()).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 503),
        other => panic!("expected 503, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_push_channel_requires_session_when_auth_enabled() {
    let server = Running::start(|c| {
        c.username = "admin".to_string();
        c.password = "hunter2".to_string();
    })
    .await;

    match connect_async(server.url()).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("expected 401, got {:?}", other.map(|_| ())),
    }
    assert_eq!(server.hub.client_count(), 0);
}

#[tokio::test]
async fn test_shutdown_closes_push_clients() {
    let mut server = Running::start(|_| {}).await;
    let mut client = server.connect().await;
    server.wait_for_clients(1).await;

    server.shutdown.take().unwrap().send(()).unwrap();

    let closed = timeout(Duration::from_secs(2), async {
        loop {
            match client.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "client should be closed on shutdown");
}
