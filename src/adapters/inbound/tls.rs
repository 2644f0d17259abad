//! HTTPS support for the management API
//!
//! Loads certificate material with rustls-pemfile and serves an axum router
//! over tokio-rustls connections through hyper-util.

use crate::infrastructure::ShutdownController;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HyperAcceptor;
use hyper_util::service::TowerToHyperService;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// TLS acceptor built from a certificate chain and private key.
#[derive(Clone)]
pub struct TlsConfig {
    pub acceptor: TlsAcceptor,
}

impl TlsConfig {
    /// Load TLS config from certificate and key files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> anyhow::Result<Self> {
        let cert_file = File::open(cert_path).map_err(|e| {
            anyhow::anyhow!("failed to open certificate {}: {}", cert_path.display(), e)
        })?;
        let key_file = File::open(key_path)
            .map_err(|e| anyhow::anyhow!("failed to open key {}: {}", key_path.display(), e))?;

        let certs: Vec<CertificateDer<'static>> =
            rustls_pemfile::certs(&mut BufReader::new(cert_file)).collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            anyhow::bail!("no certificate found in {}", cert_path.display());
        }

        let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))?
            .ok_or_else(|| anyhow::anyhow!("no private key found in {}", key_path.display()))?;

        Self::from_certs_and_key(certs, key)
    }

    /// Create TLS config from certificates and key.
    pub fn from_certs_and_key(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> anyhow::Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }
}

/// Accept TLS connections on `listener` and serve `app` until shutdown.
///
/// Handshake and per-connection errors are logged and never stop the loop.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn serve_tls(
    listener: TcpListener,
    tls: TlsConfig,
    app: Router,
    shutdown: ShutdownController,
) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.wait() => {
                tracing::debug!("HTTPS listener stopped accepting");
                return Ok(());
            }
        };

        let acceptor = tls.acceptor.clone();
        let service = app.clone();

        tokio::spawn(async move {
            match acceptor.accept(stream).await {
                Ok(tls_stream) => {
                    let io = TokioIo::new(tls_stream);
                    let service = TowerToHyperService::new(service);
                    if let Err(e) = HyperAcceptor::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        tracing::debug!("HTTPS connection error from {}: {:?}", addr, e);
                    }
                }
                Err(e) => {
                    tracing::debug!("TLS handshake failed from {}: {:?}", addr, e);
                }
            }
        });
    }
}
