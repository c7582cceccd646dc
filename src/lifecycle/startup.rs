//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build the proxy engine (routes, forwarder settings, backend TLS)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing keeps serving
//! - TLS material is loaded before any listener binds
//! - Listeners start last (traffic only when ready)

use std::future::Future;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use crate::config::{validate_config, ButlerConfig, ConfigError, Mode, TlsConfig};
use crate::engine::{EngineError, ProxyEngine};
use crate::http::{ProxyServer, ServerError, ServerSettings};
use crate::net::tls::TlsError;
use crate::net::{TcpTunnelError, TcpTunnels};
use crate::upstream::UpstreamSettings;

/// Error type for starting and running the proxy.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid listen address {value:?}")]
    Address {
        value: String,
        #[source]
        source: AddrParseError,
    },

    #[error("invalid TLS configuration")]
    Tls(#[from] TlsError),

    #[error("failed to build proxy engine")]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Tcp(#[from] TcpTunnelError),
}

/// Validate, bind, and serve until a listener stops or `shutdown` resolves.
pub async fn start<F>(config: &ButlerConfig, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()>,
{
    validate_config(config).map_err(ConfigError::Validation)?;

    match config.mode {
        Mode::Http => {
            let server = bind_http(config).await?;
            server.run_until(shutdown).await?;
        }
        Mode::Tcp => {
            let tunnels = bind_tcp(config).await?;
            tunnels.run_until(shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Build the engine and bind the HTTP(S) listeners.
pub async fn bind_http(config: &ButlerConfig) -> Result<ProxyServer, StartupError> {
    let settings = ServerSettings {
        bind_address: parse_address(&config.listener.bind_address)?,
        secure_bind_address: parse_address(&config.listener.secure_bind_address)?,
        tls: config.tls.as_ref().map(TlsConfig::material).transpose()?,
    };

    let engine = Arc::new(ProxyEngine::from_config(config)?);
    Ok(ProxyServer::bind(engine, settings).await?)
}

/// Bind every raw TCP service.
pub async fn bind_tcp(config: &ButlerConfig) -> Result<TcpTunnels, StartupError> {
    let upstream = UpstreamSettings::from(&config.upstream);
    Ok(TcpTunnels::bind(&config.services, &upstream).await?)
}

fn parse_address(value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|source| StartupError::Address {
        value: value.to_string(),
        source,
    })
}
