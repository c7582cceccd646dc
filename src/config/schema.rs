//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::tls::{TlsError, TlsMaterial, TlsSource};

/// Root configuration for Butler.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ButlerConfig {
    /// Which proxying style to run.
    pub mode: Mode,

    /// Listener configuration (plain and secure bind addresses).
    pub listener: ListenerConfig,

    /// Optional TLS material for the secure listener.
    pub tls: Option<TlsConfig>,

    /// Virtual host → destination URL.
    pub targets: BTreeMap<String, String>,

    /// Outbound transport settings for forwarded requests.
    pub upstream: UpstreamConfig,

    /// CONNECT tunnel settings.
    pub tunnel: TunnelConfig,

    /// Behavior for hosts without a route.
    pub not_found: NotFoundConfig,

    /// Raw TCP services (only used in `tcp` mode).
    pub services: Vec<ServiceConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Proxying style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Host-routed HTTP(S) reverse proxy with CONNECT tunneling.
    #[default]
    Http,
    /// Fixed-destination raw TCP tunnels.
    Tcp,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Plain-text bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,

    /// Secure bind address, used only when TLS material is configured.
    pub secure_bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:80".to_string(),
            secure_bind_address: "0.0.0.0:443".to_string(),
        }
    }
}

/// TLS configuration for the secure listener.
///
/// Exactly one source must be given: inline PEM data or file paths.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Inline certificate chain (PEM).
    pub cert_pem: Option<String>,

    /// Inline private key (PEM).
    pub key_pem: Option<String>,

    /// Path to certificate file (PEM).
    pub cert_path: Option<PathBuf>,

    /// Path to private key file (PEM).
    pub key_path: Option<PathBuf>,

    /// Redirect every plain-text request to https.
    pub enforce: bool,
}

impl TlsConfig {
    /// Resolve the configured source into TLS material.
    pub fn material(&self) -> Result<TlsMaterial, TlsError> {
        let inline = self.cert_pem.is_some() || self.key_pem.is_some();
        let files = self.cert_path.is_some() || self.key_path.is_some();

        let source = match (inline, files) {
            (true, true) => return Err(TlsError::AmbiguousSource),
            (false, false) => return Err(TlsError::MissingSource),
            (true, false) => match (&self.cert_pem, &self.key_pem) {
                (Some(cert), Some(key)) => TlsSource::Pem {
                    cert: cert.clone().into_bytes(),
                    key: key.clone().into_bytes(),
                },
                _ => return Err(TlsError::MissingSource),
            },
            (false, true) => match (&self.cert_path, &self.key_path) {
                (Some(cert), Some(key)) => TlsSource::Files {
                    cert: cert.clone(),
                    key: key.clone(),
                },
                _ => return Err(TlsError::MissingSource),
            },
        };

        Ok(TlsMaterial {
            source,
            enforce: self.enforce,
        })
    }
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// TCP dial timeout in seconds.
    pub dial_timeout_secs: u64,

    /// TCP keep-alive period in seconds.
    pub keep_alive_secs: u64,

    /// TLS handshake timeout in seconds.
    pub tls_handshake_timeout_secs: u64,

    /// Skip backend certificate verification. Off unless explicitly enabled.
    pub insecure_skip_verify: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            dial_timeout_secs: 30,
            keep_alive_secs: 30,
            tls_handshake_timeout_secs: 10,
            insecure_skip_verify: false,
        }
    }
}

/// CONNECT tunnel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Destination dial timeout in seconds.
    pub dial_timeout_secs: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            dial_timeout_secs: 10,
        }
    }
}

/// Fallback behavior for unrouted hosts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotFoundConfig {
    /// Resource fetched as the 404 body. Empty body when unset.
    pub fallback_url: Option<String>,

    /// Fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for NotFoundConfig {
    fn default() -> Self {
        Self {
            fallback_url: None,
            fetch_timeout_secs: 10,
        }
    }
}

/// A raw TCP service: local listener piped to a fixed remote.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service identifier for logging.
    pub name: String,

    /// Local bind address (e.g., "127.0.0.1:5433").
    pub local_address: String,

    /// Remote address to dial (e.g., "db.internal:5432").
    pub service_address: String,

    /// Dial the remote over TLS.
    #[serde(default)]
    pub tls: bool,

    /// TLS server name; defaults to the remote host.
    #[serde(default)]
    pub server_name: Option<String>,

    /// TCP keep-alive period in seconds.
    #[serde(default = "default_service_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_service_keep_alive() -> u64 {
    45
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format for log lines.
    pub log_format: LogFormat,

    /// Project used to qualify trace identifiers. Bare ids when empty.
    pub project_id: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            project_id: String::new(),
        }
    }
}

impl UpstreamConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn tls_handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_handshake_timeout_secs)
    }
}
