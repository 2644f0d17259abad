use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),
    #[error("invalid metrics path {0:?}: must be a literal path starting with '/'")]
    InvalidMetricsPath(String),
}

/// Check that `path` can be mounted as a plain scrape route.
///
/// Captures (`:name`), wildcards (`*rest`) and braces are rejected, since the
/// router refuses them in the middle of a path and they never make sense for a
/// fixed endpoint.
pub fn validate_metrics_path(path: &str) -> Result<(), ConfigError> {
    let literal = !path.contains([':', '*', '{', '}']);
    if path.starts_with('/') && literal {
        Ok(())
    } else {
        Err(ConfigError::InvalidMetricsPath(path.to_string()))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Metrics exporter settings
    pub metrics_enabled: bool,
    pub metrics_bind: String,
    pub metrics_path: String,
    pub metrics_namespace: String,

    // Management API settings
    pub api_enabled: bool,
    pub api_bind: String,
    pub api_cors: bool,
    pub api_pprof: bool,
    pub api_basic_auth_login: Option<String>,
    pub api_basic_auth_password: Option<String>,
    pub api_tls_cert_path: Option<String>,
    pub api_tls_key_path: Option<String>,

    pub shutdown_grace_secs: u64,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_bind: "0.0.0.0:9284".to_string(),
            metrics_path: "/metrics".to_string(),
            metrics_namespace: "lb".to_string(),
            api_enabled: false,
            api_bind: "0.0.0.0:8888".to_string(),
            api_cors: false,
            api_pprof: false,
            api_basic_auth_login: None,
            api_basic_auth_password: None,
            api_tls_cert_path: None,
            api_tls_key_path: None,
            shutdown_grace_secs: 10,
            debug: false,
        }
    }
}

/// Credentials for HTTP basic auth on the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub login: String,
    pub password: String,
}

/// Certificate and key for serving the management API over HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Validated management API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub bind: String,
    pub cors: bool,
    pub pprof: bool,
    pub basic_auth: Option<BasicAuth>,
    pub tls: Option<TlsPaths>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8888".to_string(),
            cors: false,
            pprof: false,
            basic_auth: None,
            tls: None,
        }
    }
}

impl Config {
    /// Collect the API fields, rejecting half-configured auth or TLS.
    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        let basic_auth = match (&self.api_basic_auth_login, &self.api_basic_auth_password) {
            (Some(login), Some(password)) => Some(BasicAuth {
                login: login.clone(),
                password: password.clone(),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(
                    "LB_API_BASIC_AUTH_LOGIN",
                    "LB_API_BASIC_AUTH_PASSWORD",
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete(
                    "LB_API_BASIC_AUTH_PASSWORD",
                    "LB_API_BASIC_AUTH_LOGIN",
                ))
            }
            (None, None) => None,
        };

        let tls = match (&self.api_tls_cert_path, &self.api_tls_key_path) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete("LB_API_TLS_CERT", "LB_API_TLS_KEY"))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete("LB_API_TLS_KEY", "LB_API_TLS_CERT"))
            }
            (None, None) => None,
        };

        Ok(ApiSettings {
            bind: self.api_bind.clone(),
            cors: self.api_cors,
            pprof: self.api_pprof,
            basic_auth,
            tls,
        })
    }
}

fn parse_flag(v: Option<String>) -> bool {
    v.map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Build a `Config` from an arbitrary variable lookup.
pub fn load_config_from<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    // Metrics exporter settings
    let metrics_enabled = parse_flag(var("LB_METRICS_ENABLED"));

    let metrics_bind = var("LB_METRICS_BIND").unwrap_or(defaults.metrics_bind);

    let metrics_path = var("LB_METRICS_PATH")
        .map(|p| if p.starts_with('/') { p } else { format!("/{}", p) })
        .unwrap_or(defaults.metrics_path);
    validate_metrics_path(&metrics_path)?;

    let metrics_namespace = var("LB_METRICS_NAMESPACE").unwrap_or(defaults.metrics_namespace);

    // Management API settings
    let api_enabled = parse_flag(var("LB_API_ENABLED"));

    let api_bind = var("LB_API_BIND").unwrap_or(defaults.api_bind);

    let api_cors = parse_flag(var("LB_API_CORS"));
    let api_pprof = parse_flag(var("LB_API_PPROF"));

    let api_basic_auth_login = var("LB_API_BASIC_AUTH_LOGIN");
    let api_basic_auth_password = var("LB_API_BASIC_AUTH_PASSWORD");

    let api_tls_cert_path = var("LB_API_TLS_CERT");
    let api_tls_key_path = var("LB_API_TLS_KEY");

    let shutdown_grace_secs = var("LB_SHUTDOWN_GRACE_SECS")
        .unwrap_or_else(|| "10".to_string())
        .parse()
        .unwrap_or(defaults.shutdown_grace_secs);

    let debug = var("DEBUG").is_some();

    Ok(Config {
        metrics_enabled,
        metrics_bind,
        metrics_path,
        metrics_namespace,
        api_enabled,
        api_bind,
        api_cors,
        api_pprof,
        api_basic_auth_login,
        api_basic_auth_password,
        api_tls_cert_path,
        api_tls_key_path,
        shutdown_grace_secs,
        debug,
    })
}
