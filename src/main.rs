//! lb-telemetry - metrics exporter and management API
//!
//! This is the composition root that wires together all the components.

use lb_telemetry::adapters::inbound::{ApiServer, MetricsServer};
use lb_telemetry::adapters::outbound::{DashMapServerCatalog, MetricsReporter};
use lb_telemetry::config::load_config;
use lb_telemetry::infrastructure::{shutdown_signal, ShutdownController};
use lb_telemetry::telemetry::TelemetryRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting lb-telemetry v{} metrics={} api={}",
        env!("CARGO_PKG_VERSION"),
        cfg.metrics_enabled,
        cfg.api_enabled
    );

    // ===== COMPOSITION ROOT =====

    let shutdown = ShutdownController::new();
    let registry = Arc::new(TelemetryRegistry::new(cfg.metrics_namespace.clone()));
    let catalog = Arc::new(DashMapServerCatalog::new());

    // 1. Inbound listeners. The exporter initializes the registry, so it must
    // start before any reporter is handed out.
    let metrics = match MetricsServer::start(&cfg, registry.clone(), shutdown.clone()).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("error starting metrics server: {:#}", e);
            std::process::exit(1);
        }
    };

    let api = match ApiServer::start(&cfg, catalog.clone(), registry.clone(), shutdown.clone()).await
    {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("error starting API server: {:#}", e);
            std::process::exit(1);
        }
    };

    // 2. Producer handle for the balancing core
    let reporter = MetricsReporter::new(registry);
    tracing::debug!(
        "stats reporter ready (enabled={}, servers={})",
        reporter.is_enabled(),
        catalog.len()
    );

    // 3. Run until signalled, then drain
    shutdown_signal(shutdown.clone()).await;

    let grace = Duration::from_secs(cfg.shutdown_grace_secs);
    if !shutdown.wait_for_drain(grace).await {
        tracing::warn!(
            "{} listener(s) still running after {}s",
            shutdown.running_listeners(),
            grace.as_secs()
        );
    }

    for handle in [metrics, api].into_iter().flatten() {
        if handle.is_finished() {
            match handle.await {
                Ok(Err(e)) => tracing::error!("listener exited with error: {:#}", e),
                Err(e) => tracing::error!("listener task failed: {:?}", e),
                Ok(Ok(())) => {}
            }
        } else {
            handle.abort();
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
