mod api_server;
mod metrics_server;
pub mod profiling;
mod tls;

pub use api_server::ApiServer;
pub use metrics_server::{MetricsServer, EXPOSITION_CONTENT_TYPE};
pub use tls::{serve_tls, TlsConfig};

// Re-export for external use (e.g., integration tests)
#[allow(unused_imports)]
pub use api_server::{
    ApiState, BackendStatus, RootResponse, ServerResponse, ServerStatsResponse, ServersListResponse,
};
#[allow(unused_imports)]
pub use metrics_server::MetricsState;
