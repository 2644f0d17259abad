//! Metrics Exporter Server
//!
//! Serves the telemetry registry in Prometheus text exposition format.
//! The listener is only started when metrics are enabled; the registry is
//! initialized at the same moment, so a disabled process never defines a
//! single series.

use crate::config::{validate_metrics_path, Config};
use crate::infrastructure::ShutdownController;
use crate::telemetry::TelemetryRegistry;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Content type of the text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Exporter state shared with the scrape handler.
#[derive(Clone)]
pub struct MetricsState {
    pub registry: Arc<TelemetryRegistry>,
    pub shutdown: ShutdownController,
}

/// Pull-based metrics exporter.
pub struct MetricsServer {
    listen_addr: String,
    path: String,
    state: MetricsState,
}

impl MetricsServer {
    pub fn new(
        listen_addr: String,
        path: String,
        registry: Arc<TelemetryRegistry>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            listen_addr,
            path,
            state: MetricsState { registry, shutdown },
        }
    }

    /// Start the exporter if metrics are enabled in `cfg`.
    ///
    /// Validates the scrape path, initializes `registry` and binds the
    /// listener before returning, so a bad path, a bad bind address or a
    /// second initialization surfaces as an error here.
    /// Returns `None` when metrics are disabled.
    pub async fn start(
        cfg: &Config,
        registry: Arc<TelemetryRegistry>,
        shutdown: ShutdownController,
    ) -> anyhow::Result<Option<JoinHandle<anyhow::Result<()>>>> {
        if !cfg.metrics_enabled {
            tracing::info!("metrics disabled");
            return Ok(None);
        }

        tracing::info!("starting up metrics server {}", cfg.metrics_bind);
        validate_metrics_path(&cfg.metrics_path)?;
        registry.initialize()?;

        let server = Self::new(
            cfg.metrics_bind.clone(),
            cfg.metrics_path.clone(),
            registry,
            shutdown,
        );
        let listener = server.bind().await?;

        Ok(Some(tokio::spawn(async move { server.serve(listener).await })))
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.path, get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        TcpListener::bind(&self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind metrics listener {}: {}", self.listen_addr, e))
    }

    /// Serve scrapes on an already bound listener until shutdown.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let _guard = self.state.shutdown.listener_guard();
        let shutdown = self.state.shutdown.clone();

        tracing::info!(
            "metrics listening on {}{}",
            listener.local_addr()?,
            self.path
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("metrics server stopped");
        Ok(())
    }

    /// Bind and serve.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        validate_metrics_path(&self.path)?;
        let listener = self.bind().await?;
        self.serve(listener).await
    }
}

async fn metrics_handler(State(state): State<MetricsState>) -> Response {
    if state.shutdown.is_shutdown() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down\n").into_response();
    }

    tracing::debug!("scrape: {} samples", state.registry.series_count());
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        state.registry.render(),
    )
        .into_response()
}
