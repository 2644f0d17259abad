//! Management API Server
//!
//! REST surface for operators: service info, server listings and a public
//! ping. Basic auth, CORS, TLS and the profiling routes are each optional and
//! driven by `ApiSettings`.

use crate::adapters::inbound::profiling;
use crate::adapters::inbound::tls::{serve_tls, TlsConfig};
use crate::config::{ApiSettings, Config};
use crate::domain::entities::{Backend, BackendStats, BandwidthStats, Server};
use crate::domain::ports::ServerCatalog;
use crate::infrastructure::ShutdownController;
use crate::telemetry::TelemetryRegistry;
use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;

/// Service info returned on `/`.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub metrics_enabled: bool,
}

/// List of servers response.
#[derive(Debug, Serialize)]
pub struct ServersListResponse {
    pub servers: Vec<String>,
    pub total: usize,
}

/// A backend as shown by the API.
#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub host: String,
    pub port: String,
    pub priority: u32,
    pub weight: u32,
    pub stats: BackendStats,
}

impl From<&Backend> for BackendStatus {
    fn from(b: &Backend) -> Self {
        Self {
            host: b.target.host.clone(),
            port: b.target.port.clone(),
            priority: b.priority,
            weight: b.weight,
            stats: b.stats.clone(),
        }
    }
}

/// Full server snapshot.
#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub name: String,
    pub active_connections: u64,
    pub bandwidth: BandwidthStats,
    pub backends: Vec<BackendStatus>,
}

impl From<&Server> for ServerResponse {
    fn from(s: &Server) -> Self {
        Self {
            name: s.name.clone(),
            active_connections: s.active_connections,
            bandwidth: s.bandwidth,
            backends: s.sorted_backends().into_iter().map(BackendStatus::from).collect(),
        }
    }
}

/// Aggregate stats of a server.
#[derive(Debug, Serialize)]
pub struct ServerStatsResponse {
    pub active_connections: u64,
    pub rx_total: u64,
    pub tx_total: u64,
    pub rx_second: u64,
    pub tx_second: u64,
    pub backends_total: usize,
    pub backends_live: usize,
}

impl From<&Server> for ServerStatsResponse {
    fn from(s: &Server) -> Self {
        Self {
            active_connections: s.active_connections,
            rx_total: s.bandwidth.rx_total,
            tx_total: s.bandwidth.tx_total,
            rx_second: s.bandwidth.rx_second,
            tx_second: s.bandwidth.tx_second,
            backends_total: s.backends.len(),
            backends_live: s.live_backends(),
        }
    }
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub catalog: Arc<dyn ServerCatalog>,
    pub registry: Arc<TelemetryRegistry>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(catalog: Arc<dyn ServerCatalog>, registry: Arc<TelemetryRegistry>) -> Self {
        Self {
            catalog,
            registry,
            started_at: Instant::now(),
        }
    }
}

/// Management API server.
pub struct ApiServer {
    settings: ApiSettings,
    state: ApiState,
    shutdown: ShutdownController,
}

impl ApiServer {
    pub fn new(
        settings: ApiSettings,
        catalog: Arc<dyn ServerCatalog>,
        registry: Arc<TelemetryRegistry>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            settings,
            state: ApiState::new(catalog, registry),
            shutdown,
        }
    }

    /// Start the API if it is enabled in `cfg`.
    ///
    /// Settings, TLS material and the listener are all resolved before
    /// returning; any failure there is a startup error.
    pub async fn start(
        cfg: &Config,
        catalog: Arc<dyn ServerCatalog>,
        registry: Arc<TelemetryRegistry>,
        shutdown: ShutdownController,
    ) -> anyhow::Result<Option<JoinHandle<anyhow::Result<()>>>> {
        if !cfg.api_enabled {
            tracing::info!("API disabled");
            return Ok(None);
        }

        tracing::info!("starting up API");
        let server = Self::new(cfg.api_settings()?, catalog, registry, shutdown);
        let tls = server.tls_config()?;
        let listener = server.bind().await?;

        Ok(Some(tokio::spawn(async move {
            server.serve(listener, tls).await
        })))
    }

    /// Load TLS material if configured.
    pub fn tls_config(&self) -> anyhow::Result<Option<TlsConfig>> {
        self.settings
            .tls
            .as_ref()
            .map(|paths| TlsConfig::from_pem_files(&paths.cert_path, &paths.key_path))
            .transpose()
    }

    pub fn router(&self) -> Router {
        let mut protected = Router::new()
            .route("/", get(root_handler))
            .route("/servers", get(list_servers_handler))
            .route("/servers/:name", get(get_server_handler))
            .route("/servers/:name/stats", get(server_stats_handler));

        if let Some(auth) = &self.settings.basic_auth {
            tracing::info!("Using HTTP Basic Auth");
            protected = protected.layer(ValidateRequestHeaderLayer::basic(&auth.login, &auth.password));
        }

        let public = Router::new().route("/ping", get(ping_handler));

        let mut app = protected.merge(public);

        if self.settings.pprof {
            tracing::info!("Registering /debug/pprof");
            app = app.merge(profiling::routes());
        }

        app = app.layer(TraceLayer::new_for_http());

        if self.settings.cors {
            tracing::info!("API CORS enabled");
            app = app.layer(cors_layer());
        }

        app.with_state(self.state.clone())
    }

    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        TcpListener::bind(&self.settings.bind)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind API listener {}: {}", self.settings.bind, e))
    }

    /// Serve the API on an already bound listener until shutdown.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn serve(&self, listener: TcpListener, tls: Option<TlsConfig>) -> anyhow::Result<()> {
        let _guard = self.shutdown.listener_guard();
        let app = self.router();
        let local_addr = listener.local_addr()?;

        match tls {
            Some(tls) => {
                tracing::info!("Starting HTTPS server {}", local_addr);
                serve_tls(listener, tls, app, self.shutdown.clone()).await?;
            }
            None => {
                tracing::info!("Starting HTTP server {}", local_addr);
                let shutdown = self.shutdown.clone();
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { shutdown.wait().await })
                    .await?;
            }
        }

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Load TLS material, bind and serve.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let tls = self.tls_config()?;
        let listener = self.bind().await?;
        self.serve(listener, tls).await
    }
}

/// Any origin (mirrored so credentials are allowed) with a fixed method and header allowlist.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::GET,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::AUTHORIZATION])
}

fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "server": name,
            "error": "server not found"
        })),
    )
        .into_response()
}

// Handler functions

async fn root_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(RootResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        metrics_enabled: state.registry.is_enabled(),
    })
}

async fn ping_handler() -> &'static str {
    "pong"
}

async fn list_servers_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let servers = state.catalog.list();
    let total = servers.len();
    Json(ServersListResponse { servers, total })
}

async fn get_server_handler(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.catalog.get(&name) {
        Some(server) => Json(ServerResponse::from(&server)).into_response(),
        None => not_found(&name),
    }
}

async fn server_stats_handler(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.catalog.get(&name) {
        Some(server) => Json(ServerStatsResponse::from(&server)).into_response(),
        None => not_found(&name),
    }
}
