//! HTTP surface: router, shared state and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{any, get};
use mission_protocol::constants::AGENT_WS_PATH;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::registry::ConnectionRegistry;
use crate::{upload, ws};

/// Default cap on one upload body: 2 GiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 2 << 30;

/// Runtime knobs of the gateway endpoints.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Secret the agent must present; empty disables the check.
    pub agent_secret: String,
    /// Largest accepted upload in bytes; 0 means unlimited.
    pub max_upload_size: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            agent_secret: String::new(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub settings: Arc<GatewaySettings>,
    /// Cancelled when the process shuts down; in-flight dispatches derive
    /// child tokens from it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(settings: GatewaySettings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry)));
        Self {
            registry,
            dispatcher,
            settings: Arc::new(settings),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Builds the gateway router.
///
/// The upload route accepts any method so the handler controls the order
/// of its checks. axum's default body limit is disabled because the
/// upload handler enforces its own.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/api/v1/health", get(health))
        .route("/api/v1/agent/health", get(agent_health))
        .route("/api/v1/upload", any(upload::upload))
        .route(AGENT_WS_PATH, get(ws::agent_ws))
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Serves the router on `listener` until `state.shutdown` is cancelled.
///
/// On shutdown the active agent connection is closed before axum drains
/// the remaining HTTP connections.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let registry = Arc::clone(&state.registry);
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("gateway listening on {addr}");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!("gateway shutting down");
            registry.close_active().await;
        })
        .await
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

async fn banner() -> String {
    format!(
        "mission-gateway {}\nAPI available at /api/v1\n",
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Serialize)]
struct Health {
    ok: bool,
}

async fn health() -> Json<Health> {
    Json(Health { ok: true })
}

#[derive(Serialize)]
struct AgentHealth {
    online: bool,
}

async fn agent_health(State(state): State<AppState>) -> Json<AgentHealth> {
    Json(AgentHealth {
        online: state.registry.is_online().await,
    })
}
