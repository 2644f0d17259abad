//! CPU profiling routes
//!
//! `/debug/pprof` lists what is available; `/debug/pprof/profile` samples the
//! process for a number of seconds and answers with a flamegraph SVG.

use axum::{
    extract::Query,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_PROFILE_SECS: u64 = 30;
const MAX_PROFILE_SECS: u64 = 60;
const DEFAULT_FREQUENCY: i32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ProfileParams {
    pub seconds: Option<u64>,
    pub frequency: Option<i32>,
}

impl ProfileParams {
    /// Sampling window, clamped to `1..=60` seconds.
    pub fn duration(&self) -> Duration {
        let secs = self
            .seconds
            .unwrap_or(DEFAULT_PROFILE_SECS)
            .clamp(1, MAX_PROFILE_SECS);
        Duration::from_secs(secs)
    }

    /// Sampling frequency in Hz, clamped to `1..=1000`.
    pub fn frequency(&self) -> i32 {
        self.frequency.unwrap_or(DEFAULT_FREQUENCY).clamp(1, 1000)
    }
}

/// Routes for the profiling group; mounted without authentication.
pub fn routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/debug/pprof", get(index_handler))
        .route("/debug/pprof/profile", get(profile_handler))
}

async fn index_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "profiles:\n  /debug/pprof/profile?seconds=30&frequency=100  CPU flamegraph (svg)\n",
    )
}

async fn profile_handler(Query(params): Query<ProfileParams>) -> Response {
    let duration = params.duration();
    let frequency = params.frequency();
    tracing::info!(
        "collecting CPU profile for {}s at {}Hz",
        duration.as_secs(),
        frequency
    );

    let result = tokio::task::spawn_blocking(move || cpu_flamegraph(duration, frequency)).await;

    match result {
        Ok(Ok(svg)) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Ok(Err(e)) => {
            tracing::warn!("CPU profile failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("profile failed: {}\n", e),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("profiling task panicked: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn cpu_flamegraph(duration: Duration, frequency: i32) -> anyhow::Result<Vec<u8>> {
    let guard = pprof::ProfilerGuard::new(frequency)?;
    std::thread::sleep(duration);

    let report = guard.report().build()?;
    let mut svg = Vec::new();
    report.flamegraph(&mut svg)?;
    Ok(svg)
}
