//! CONNECT tunneling.
//!
//! # Responsibilities
//! - Resolve and dial the tunnel target under a deadline
//! - Answer 200, then take over the client connection
//! - Relay bytes both ways until the tunnel is torn down
//!
//! # Design Decisions
//! - The target is dialed before answering; a failed dial is a 503 and no
//!   tunnel bytes are ever exchanged
//! - Both streams are owned by the relay task and dropped when it ends
//! - Per-direction shutdown (half-close), same as the raw TCP services

use std::io;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::engine::ProxyEngine;
use crate::http::capability::Hijackable;
use crate::http::request::{request_host, strip_port};
use crate::http::response::{error_chain, hijack_unsupported, service_unavailable};
use crate::net::pipe::pipe;

/// Error type for establishing a tunnel.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("CONNECT request names no target")]
    MissingTarget,

    #[error("destination {0:?} has no host")]
    InvalidDestination(String),

    #[error("failed to dial {target}")]
    Dial {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("dialing {target} timed out after {after:?}")]
    Timeout { target: String, after: Duration },
}

/// Handle one CONNECT request.
pub async fn tunnel(engine: &ProxyEngine, mut request: Request<Body>) -> Response<Body> {
    let Some(on_upgrade) = request.take_upgrade() else {
        tracing::error!("Connection cannot be hijacked for CONNECT");
        return hijack_unsupported();
    };

    // Resolved up front: the request body is not `Sync`, so no borrow of the
    // request may live across an await.
    let target = resolve_target(engine, &request);
    let established = async {
        let target = target?;
        let stream = dial(&target, engine.tunnel_dial_timeout()).await?;
        Ok::<_, TunnelError>((target, stream))
    };

    let (target, destination) = match established.await {
        Ok(established) => established,
        Err(e) => {
            tracing::warn!(error = %error_chain(&e), "Tunnel dial failed");
            return service_unavailable(&e);
        }
    };

    tracing::debug!(target = %target, "Tunnel established");

    tokio::spawn(
        async move {
            let client = match on_upgrade.await {
                Ok(upgraded) => TokioIo::new(upgraded),
                Err(e) => {
                    tracing::warn!(error = %e, "Client connection upgrade failed");
                    return;
                }
            };

            match pipe(client, destination).await {
                Ok(stats) => tracing::debug!(
                    client_to_target = stats.a_to_b,
                    target_to_client = stats.b_to_a,
                    "Tunnel closed"
                ),
                Err(e) => tracing::debug!(error = %e, "Tunnel closed with error"),
            }
        }
        .in_current_span(),
    );

    Response::new(Body::empty())
}

/// `host:port` to dial for a CONNECT request.
///
/// A routed authority (full authority first, then the host alone) dials its
/// destination; anything else dials the authority as requested.
pub fn resolve_target<B>(engine: &ProxyEngine, request: &Request<B>) -> Result<String, TunnelError> {
    let authority = request
        .uri()
        .authority()
        .map(|a| a.as_str().to_ascii_lowercase())
        .or_else(|| request_host(request))
        .ok_or(TunnelError::MissingTarget)?;

    let routes = engine.routes();
    let routed = routes
        .get(&authority)
        .or_else(|| routes.get(strip_port(&authority)));

    match routed {
        Some(destination) => destination
            .socket_target()
            .ok_or_else(|| TunnelError::InvalidDestination(destination.to_string())),
        None => Ok(authority),
    }
}

async fn dial(target: &str, after: Duration) -> Result<TcpStream, TunnelError> {
    match tokio::time::timeout(after, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(TunnelError::Dial {
            target: target.to_string(),
            source,
        }),
        Err(_) => Err(TunnelError::Timeout {
            target: target.to_string(),
            after,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use axum::http::{Method, StatusCode};

    fn engine() -> ProxyEngine {
        let engine = ProxyEngine::new(EngineSettings::default()).unwrap();
        engine.add_route("db.example", "https://10.0.0.5").unwrap();
        engine.add_route("cache.example:6379", "tcp://10.0.0.6:7000").unwrap();
        engine
    }

    fn connect(authority: &str) -> Request<Body> {
        Request::builder()
            .method(Method::CONNECT)
            .uri(authority)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn routed_host_dials_destination_default_port() {
        let target = resolve_target(&engine(), &connect("db.example:443")).unwrap();
        assert_eq!(target, "10.0.0.5:443");
    }

    #[test]
    fn full_authority_wins() {
        let target = resolve_target(&engine(), &connect("cache.example:6379")).unwrap();
        assert_eq!(target, "10.0.0.6:7000");
    }

    #[test]
    fn unrouted_authority_is_dialed_as_given() {
        let target = resolve_target(&engine(), &connect("Elsewhere.example:22")).unwrap();
        assert_eq!(target, "elsewhere.example:22");
    }

    #[test]
    fn routed_destination_without_port_is_rejected() {
        let engine = engine();
        engine.add_route("odd.example", "tcp://10.0.0.7").unwrap();

        let err = resolve_target(&engine, &connect("odd.example:1")).unwrap_err();
        assert!(matches!(err, TunnelError::InvalidDestination(_)));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn tunnel_future_is_send() {
        let engine = engine();
        let handling = tunnel(&engine, connect("db.example:443"));
        assert_send(&handling);
    }

    #[tokio::test]
    async fn without_upgrade_handle_is_500() {
        let response = tunnel(&engine(), connect("db.example:443")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
