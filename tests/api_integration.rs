//! Integration tests for the management API
//!
//! Starts the API on real listeners, over plain HTTP and HTTPS.

use lb_telemetry::config::{ApiSettings, BasicAuth, TlsPaths};
use lb_telemetry::{
    ApiServer, Backend, BackendStats, Config, DashMapServerCatalog, Server, ShutdownController,
    Target, TelemetryRegistry,
};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

fn catalog() -> Arc<DashMapServerCatalog> {
    let catalog = DashMapServerCatalog::new();
    catalog.upsert(
        Server::new("web").with_backend(Backend::new(Target::new("10.0.0.1", "80")).with_stats(
            BackendStats {
                live: true,
                total_connections: 12,
                ..Default::default()
            },
        )),
    );
    Arc::new(catalog)
}

/// Spawn the API on an ephemeral port and return its address.
async fn spawn_api(
    settings: ApiSettings,
    catalog: Arc<DashMapServerCatalog>,
    shutdown: ShutdownController,
) -> SocketAddr {
    let server = ApiServer::new(
        ApiSettings {
            bind: "127.0.0.1:0".to_string(),
            ..settings
        },
        catalog,
        Arc::new(TelemetryRegistry::disabled()),
        shutdown,
    );
    let tls = server.tls_config().unwrap();
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { server.serve(listener, tls).await });
    addr
}

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// Test listing and fetching servers over HTTP
#[tokio::test]
async fn test_http_servers() {
    let addr = spawn_api(ApiSettings::default(), catalog(), ShutdownController::new()).await;

    let list: serde_json::Value = reqwest::get(format!("http://{}/servers", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["servers"], serde_json::json!(["web"]));

    let server: serde_json::Value = reqwest::get(format!("http://{}/servers/web", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(server["backends"][0]["stats"]["total_connections"], 12);

    let resp = reqwest::get(format!("http://{}/servers/missing/stats", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

/// Snapshots published after startup are visible
#[tokio::test]
async fn test_catalog_updates_are_served() {
    let catalog = catalog();
    let addr = spawn_api(ApiSettings::default(), catalog.clone(), ShutdownController::new()).await;

    catalog.upsert(Server::new("db"));
    let stats: serde_json::Value = reqwest::get(format!("http://{}/servers/db/stats", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["backends_total"], 0);

    assert!(catalog.remove("db"));
    let resp = reqwest::get(format!("http://{}/servers/db", addr)).await.unwrap();
    assert_eq!(resp.status(), 404);
}

/// Test basic auth over a real connection
#[tokio::test]
async fn test_http_basic_auth() {
    let settings = ApiSettings {
        basic_auth: Some(BasicAuth {
            login: "admin".to_string(),
            password: "secret".to_string(),
        }),
        ..ApiSettings::default()
    };
    let addr = spawn_api(settings, catalog(), ShutdownController::new()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("http://{}/servers", addr)).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("http://{}/servers", addr))
        .basic_auth("admin", Some("secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("http://{}/ping", addr)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "pong");
}

/// Test serving over HTTPS with a self-signed certificate
#[tokio::test]
async fn test_https_api() {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert = write_temp(&certified.cert.pem());
    let key = write_temp(&certified.key_pair.serialize_pem());

    let settings = ApiSettings {
        tls: Some(TlsPaths {
            cert_path: cert.path().to_path_buf(),
            key_path: key.path().to_path_buf(),
        }),
        ..ApiSettings::default()
    };
    let addr = spawn_api(settings, catalog(), ShutdownController::new()).await;

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap();

    let resp = client
        .get(format!("https://localhost:{}/ping", addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "pong");

    let list: serde_json::Value = client
        .get(format!("https://localhost:{}/servers", addr.port()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 1);
}

/// Plain HTTP against the HTTPS listener fails
#[tokio::test]
async fn test_https_rejects_plain_http() {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert = write_temp(&certified.cert.pem());
    let key = write_temp(&certified.key_pair.serialize_pem());

    let settings = ApiSettings {
        tls: Some(TlsPaths {
            cert_path: cert.path().to_path_buf(),
            key_path: key.path().to_path_buf(),
        }),
        ..ApiSettings::default()
    };
    let addr = spawn_api(settings, catalog(), ShutdownController::new()).await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let result = client.get(format!("http://{}/ping", addr)).send().await;
    assert!(result.is_err());
}

/// Shutdown stops the API listener
#[tokio::test]
async fn test_start_and_shutdown() {
    let cfg = Config {
        api_enabled: true,
        api_bind: "127.0.0.1:0".to_string(),
        ..Config::default()
    };
    let shutdown = ShutdownController::new();

    let handle = ApiServer::start(
        &cfg,
        catalog(),
        Arc::new(TelemetryRegistry::disabled()),
        shutdown.clone(),
    )
    .await
    .unwrap()
    .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
