//! Raw TCP tunnel services.
//!
//! # Responsibilities
//! - Bind one listener per configured service
//! - For each accepted client, dial the service's fixed remote (optionally
//!   over TLS) and pipe bytes both ways
//!
//! # Design Decisions
//! - No HTTP semantics at all; bytes are relayed untouched
//! - TCP keep-alive is enabled on both legs
//! - Half-close: a finished direction only shuts down the write side of
//!   its destination, letting the other direction drain
//! - A failed dial drops the client connection; it never stops the service

use std::future::Future;
use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_rustls::TlsConnector;
use tracing::Instrument;

use crate::config::ServiceConfig;
use crate::net::connection::ConnectionId;
use crate::net::listener::{Listener, ListenerError};
use crate::net::pipe::{pipe, PipeStats};
use crate::net::tls::{client_config, TlsError};
use crate::upstream::UpstreamSettings;

/// Error type for the raw TCP services.
#[derive(Debug, thiserror::Error)]
pub enum TcpTunnelError {
    #[error("service {service}: invalid local address {value:?}")]
    LocalAddress {
        service: String,
        value: String,
        #[source]
        source: AddrParseError,
    },

    #[error("service {service}: invalid TLS server name {value:?}")]
    ServerName { service: String, value: String },

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to set up service TLS")]
    Tls(#[from] TlsError),

    #[error("service {0} stopped")]
    Exited(String),

    #[error("service task failed")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
enum DialError {
    #[error("failed to connect to {remote}")]
    Connect {
        remote: String,
        #[source]
        source: io::Error,
    },

    #[error("connecting to {remote} timed out after {after:?}")]
    Timeout { remote: String, after: Duration },

    #[error("TLS handshake with {remote} failed")]
    Handshake {
        remote: String,
        #[source]
        source: io::Error,
    },
}

/// Fixed remote for one service.
struct Remote {
    name: String,
    address: String,
    tls: Option<(TlsConnector, ServerName<'static>)>,
    keep_alive: Duration,
    dial_timeout: Duration,
    handshake_timeout: Duration,
}

struct TcpService {
    listener: Listener,
    remote: Arc<Remote>,
}

/// All bound raw TCP services.
pub struct TcpTunnels {
    services: Vec<TcpService>,
}

impl TcpTunnels {
    /// Bind every service's local listener.
    pub async fn bind(
        services: &[ServiceConfig],
        upstream: &UpstreamSettings,
    ) -> Result<Self, TcpTunnelError> {
        let connector = if services.iter().any(|s| s.tls) {
            Some(TlsConnector::from(client_config(upstream.insecure_skip_verify)?))
        } else {
            None
        };

        let mut bound = Vec::with_capacity(services.len());
        for service in services {
            let local: SocketAddr =
                service
                    .local_address
                    .parse()
                    .map_err(|source| TcpTunnelError::LocalAddress {
                        service: service.name.clone(),
                        value: service.local_address.clone(),
                        source,
                    })?;

            let tls = match (&connector, service.tls) {
                (Some(connector), true) => Some((connector.clone(), server_name(service)?)),
                _ => None,
            };

            let listener = Listener::bind(local, "tcp").await?;
            tracing::info!(
                service = %service.name,
                local_address = %listener.local_addr(),
                service_address = %service.service_address,
                tls = service.tls,
                "TCP service bound"
            );

            bound.push(TcpService {
                listener,
                remote: Arc::new(Remote {
                    name: service.name.clone(),
                    address: service.service_address.clone(),
                    tls,
                    keep_alive: Duration::from_secs(service.keep_alive_secs),
                    dial_timeout: upstream.dial_timeout,
                    handshake_timeout: upstream.tls_handshake_timeout,
                }),
            });
        }

        Ok(Self { services: bound })
    }

    /// `(service name, bound address)` for every service.
    pub fn local_addrs(&self) -> Vec<(String, SocketAddr)> {
        self.services
            .iter()
            .map(|s| (s.remote.name.clone(), s.listener.local_addr()))
            .collect()
    }

    /// Serve until a service stops or `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), TcpTunnelError>
    where
        F: Future<Output = ()>,
    {
        let mut running = JoinSet::new();
        for service in self.services {
            running.spawn(service.serve());
        }

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown requested, closing TCP services");
                Ok(())
            }
            Some(exited) = running.join_next() => {
                let name = exited?;
                tracing::error!(service = %name, "TCP service stopped");
                Err(TcpTunnelError::Exited(name))
            }
        }
    }
}

impl TcpService {
    async fn serve(self) -> String {
        loop {
            let (client, peer) = self.listener.accept().await;
            let remote = Arc::clone(&self.remote);
            let span = tracing::debug_span!(
                "connection",
                id = %ConnectionId::new(),
                peer_addr = %peer,
                service = %remote.name,
            );
            tokio::spawn(handle(remote, client).instrument(span));
        }
    }
}

async fn handle(remote: Arc<Remote>, client: TcpStream) {
    set_keepalive(&client, remote.keep_alive);

    let result = match connect(&remote).await {
        Ok(Leg::Plain(stream)) => pipe(client, stream).await,
        Ok(Leg::Tls(stream)) => pipe(client, *stream).await,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to connect to service");
            return;
        }
    };

    match result {
        Ok(PipeStats { a_to_b, b_to_a }) => {
            tracing::debug!(client_to_service = a_to_b, service_to_client = b_to_a, "Connection closed")
        }
        Err(e) => tracing::debug!(error = %e, "Connection closed with error"),
    }
}

enum Leg {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

async fn connect(remote: &Remote) -> Result<Leg, DialError> {
    let dialing = TcpStream::connect(remote.address.as_str());
    let stream = match tokio::time::timeout(remote.dial_timeout, dialing).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(DialError::Connect {
                remote: remote.address.clone(),
                source,
            })
        }
        Err(_) => {
            return Err(DialError::Timeout {
                remote: remote.address.clone(),
                after: remote.dial_timeout,
            })
        }
    };
    set_keepalive(&stream, remote.keep_alive);

    let Some((connector, name)) = &remote.tls else {
        return Ok(Leg::Plain(stream));
    };

    let handshake = connector.connect(name.clone(), stream);
    match tokio::time::timeout(remote.handshake_timeout, handshake).await {
        Ok(Ok(stream)) => Ok(Leg::Tls(Box::new(stream))),
        Ok(Err(source)) => Err(DialError::Handshake {
            remote: remote.address.clone(),
            source,
        }),
        Err(_) => Err(DialError::Timeout {
            remote: remote.address.clone(),
            after: remote.handshake_timeout,
        }),
    }
}

fn set_keepalive(stream: &TcpStream, period: Duration) {
    let keepalive = TcpKeepalive::new().with_time(period);
    if let Err(e) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
        tracing::debug!(error = %e, "Failed to enable TCP keep-alive");
    }
}

/// TLS server name for a service: configured, else the remote's host.
fn server_name(service: &ServiceConfig) -> Result<ServerName<'static>, TcpTunnelError> {
    let value = match &service.server_name {
        Some(name) => name.clone(),
        None => remote_host(&service.service_address).to_string(),
    };

    ServerName::try_from(value.clone()).map_err(|_| TcpTunnelError::ServerName {
        service: service.name.clone(),
        value,
    })
}

fn remote_host(address: &str) -> &str {
    let host = match address.rsplit_once(':') {
        Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => address,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(address: &str, server_name: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            name: "db".to_string(),
            local_address: "127.0.0.1:0".to_string(),
            service_address: address.to_string(),
            tls: true,
            server_name: server_name.map(str::to_string),
            keep_alive_secs: 45,
        }
    }

    #[test]
    fn remote_host_strips_port_and_brackets() {
        assert_eq!(remote_host("db.internal:5432"), "db.internal");
        assert_eq!(remote_host("[::1]:5432"), "::1");
        assert_eq!(remote_host("db.internal"), "db.internal");
    }

    #[test]
    fn server_name_defaults_to_remote_host() {
        let name = server_name(&service("db.internal:5432", None)).unwrap();
        assert_eq!(name.to_str(), "db.internal");

        let name = server_name(&service("10.0.0.1:5432", Some("db.example"))).unwrap();
        assert_eq!(name.to_str(), "db.example");
    }

    #[test]
    fn invalid_server_name_is_rejected() {
        let err = server_name(&service("db.internal:5432", Some("bad name!"))).unwrap_err();
        assert!(matches!(err, TcpTunnelError::ServerName { .. }));
    }

    #[tokio::test]
    async fn bad_local_address_fails_bind() {
        let mut config = service("127.0.0.1:1", None);
        config.tls = false;
        config.local_address = "nowhere".to_string();

        let err = TcpTunnels::bind(&[config], &UpstreamSettings::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TcpTunnelError::LocalAddress { .. }));
    }
}
