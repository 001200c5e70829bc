//! HTTP server implementation using axum.
//!
//! A single fallback handler classifies each request with
//! [`classify`](crate::route::classify) and hands it to the matching
//! handler, so the whole routing table lives in one place.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use minerd_core::{Miner, MinerServer};
use minerd_telemetry::Metrics;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::assets::AssetResolver;
use crate::auth::AuthGate;
use crate::config::WebConfig;
use crate::error::{AuthError, WebError, WebResult};
use crate::forward::ForwardProxy;
use crate::handlers;
use crate::hub::{BroadcastHub, Subscription};
use crate::route::{classify, AuthAction, RouteDecision};
use crate::session::SessionStore;
use crate::template::TemplateStore;
use crate::types::PushMessage;

/// Templates every deployment must provide.
pub const REQUIRED_TEMPLATES: [&str; 5] = ["layout", "dashboard", "login", "settings", "plotfiles"];

struct Inner {
    config: WebConfig,
    templates: TemplateStore,
    assets: AssetResolver,
    auth: AuthGate,
    hub: BroadcastHub,
    proxy: ForwardProxy,
    miner: Arc<dyn Miner>,
    server: Arc<dyn MinerServer>,
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl AppState {
    /// Load templates and wire up the control plane.
    pub fn new(
        config: WebConfig,
        miner: Arc<dyn Miner>,
        server: Arc<dyn MinerServer>,
        hub: BroadcastHub,
    ) -> WebResult<Self> {
        let templates = TemplateStore::load(&config.template_dir, &REQUIRED_TEMPLATES)?;
        let assets = AssetResolver::new(&config.asset_dir);
        let sessions = Arc::new(SessionStore::new(config.session_idle_timeout()));
        let auth = AuthGate::new(&config, sessions);
        let proxy = ForwardProxy::new(&config.backends, config.forward_timeout(), &config.cookie_name)?;

        if !auth.enabled() {
            warn!("No web credentials configured, authentication is disabled");
        }

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                templates,
                assets,
                auth,
                hub,
                proxy,
                miner,
                server,
            }),
        })
    }

    pub fn config(&self) -> &WebConfig {
        &self.inner.config
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.inner.templates
    }

    pub fn assets(&self) -> &AssetResolver {
        &self.inner.assets
    }

    pub fn auth(&self) -> &AuthGate {
        &self.inner.auth
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.inner.hub
    }

    pub fn proxy(&self) -> &ForwardProxy {
        &self.inner.proxy
    }

    pub fn miner(&self) -> &Arc<dyn Miner> {
        &self.inner.miner
    }

    pub fn server(&self) -> &Arc<dyn MinerServer> {
        &self.inner.server
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let started = Instant::now();
    let decision = classify(req.method(), req.uri().path(), req.uri().query());
    let label = decision.label();

    let response = match handle(&state, decision, req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    Metrics::http_request(
        label,
        response.status().as_u16(),
        started.elapsed().as_secs_f64() * 1000.0,
    );
    response
}

async fn handle(state: &AppState, decision: RouteDecision, req: Request) -> WebResult<Response> {
    match decision {
        RouteDecision::Asset(path) => handlers::asset(state, &path).await,
        RouteDecision::SecuredPage(page) => {
            handlers::secured_page(state, page, &CookieJar::from_headers(req.headers()))
        }
        RouteDecision::PlainPage(page) => handlers::plain_page(
            state,
            page,
            req.uri().query(),
            &CookieJar::from_headers(req.headers()),
        ),
        RouteDecision::AuthAction(AuthAction::Login) => handlers::login(state, req).await,
        RouteDecision::AuthAction(AuthAction::Logout) => Ok(handlers::logout(
            state,
            CookieJar::from_headers(req.headers()),
        )),
        RouteDecision::ApiAction(action) => handlers::api(state, action, req).await,
        RouteDecision::Forward(host, path) => state.proxy().forward(req, host, &path).await,
        RouteDecision::PushChannel => push_channel(state, req).await,
        RouteDecision::NotFound => Err(WebError::NotFound),
        RouteDecision::BadRequest => Err(WebError::BadRequest(format!(
            "{} not allowed on {}",
            req.method(),
            req.uri().path()
        ))),
    }
}

/// Upgrade to the push channel.
async fn push_channel(state: &AppState, req: Request) -> WebResult<Response> {
    let (mut parts, _body) = req.into_parts();

    if !state.auth().is_logged_in(&CookieJar::from_headers(&parts.headers)) {
        return Err(AuthError::InvalidCredentials.into());
    }

    let ws = WebSocketUpgrade::from_request_parts(&mut parts, state)
        .await
        .map_err(|e| WebError::BadRequest(e.body_text()))?;

    // The current state goes ahead of any live telemetry.
    let welcome: Vec<String> = [
        PushMessage::Config(state.miner().settings()),
        PushMessage::MiningInfo(state.miner().current_info()),
    ]
    .iter()
    .filter_map(|message| {
        message
            .encode()
            .inspect_err(|e| debug!(error = %e, "Failed to serialize welcome message"))
            .ok()
    })
    .collect();

    let subscription = state
        .hub()
        .subscribe_with(welcome)
        .ok_or(WebError::PushClientsExhausted)?;

    info!(
        client_id = subscription.id(),
        clients = state.hub().client_count(),
        "New push client"
    );
    Ok(ws.on_upgrade(move |socket| serve_push_client(socket, subscription)))
}

/// Drain one client's queue into its socket until either side closes.
async fn serve_push_client(socket: WebSocket, subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();

    // Clients send nothing but control frames; watch for close.
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            next = subscription.recv() => match next {
                Some(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        debug!("Failed to send message, client disconnected");
                        break;
                    }
                }
                None => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = &mut incoming_task => {
                debug!("Incoming task completed, closing connection");
                break;
            }
        }
    }

    subscription.close();
    incoming_task.abort();
    info!(
        client_id = subscription.id(),
        dropped = subscription.dropped(),
        "Push client closed"
    );
}

/// Serve on `listener` until `shutdown` resolves.
///
/// Also runs the session sweeper and the mining info ticker for the
/// lifetime of the server. Push clients are closed as soon as shutdown
/// starts so graceful shutdown does not wait on them.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> WebResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sweeper = spawn_session_sweeper(&state);
    let ticker = tokio::spawn(crate::ticker::run_info_ticker(
        Arc::clone(state.miner()),
        state.hub().clone(),
        state.config().info_interval_ms,
    ));

    let hub = state.hub().clone();
    let app = create_router(state);
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Starting web control plane");
    }

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Web control plane shutting down");
            hub.close_all();
        })
        .await;

    ticker.abort();
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result.map_err(WebError::Io)
}

/// Bind the configured address and [`serve`].
pub async fn run_server<F>(state: AppState, shutdown: F) -> WebResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config().socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

fn spawn_session_sweeper(state: &AppState) -> Option<tokio::task::JoinHandle<()>> {
    let secs = state.config().session_sweep_interval_secs;
    if secs == 0 {
        return None;
    }
    let sessions = Arc::clone(state.auth().sessions());
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(secs));
        loop {
            interval.tick().await;
            sessions.sweep_expired();
        }
    }))
}
