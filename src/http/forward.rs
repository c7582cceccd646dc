//! Forwarding engine for non-CONNECT requests.
//!
//! # Responsibilities
//! - Resolve the destination for the request's Host
//! - Fetch (or build) the host's cached forwarder
//! - Rewrite, send, and relay the response
//! - Abort the backend round trip when the client goes away
//!
//! # Design Decisions
//! - A routing miss never reaches a backend; the not-found responder answers
//! - Transport failures become 502 with the error chain as body; no retries
//! - The routing and cache locks are released before the round trip starts

use std::net::IpAddr;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper::body::Incoming;

use crate::engine::ProxyEngine;
use crate::http::capability::Cancelable;
use crate::http::headers::accepts_trailers;
use crate::http::request::{request_host, rewrite};
use crate::http::response::{bad_gateway, error_chain, relay};
use crate::upstream::Forwarder;

/// Error type for a single forwarded request.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid destination {destination:?}")]
    InvalidDestination {
        destination: String,
        #[source]
        source: Option<axum::http::Error>,
    },

    #[error("upstream request failed")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("client disconnected before the backend responded")]
    ClientDisconnected,
}

/// Handle one non-CONNECT request end to end.
pub async fn forward(engine: &ProxyEngine, request: Request<Body>, client_ip: IpAddr) -> Response<Body> {
    let host = request_host(&request).unwrap_or_default();
    let Some(destination) = engine.routes().get(&host) else {
        tracing::warn!(host = %host, "No route for host");
        return engine.not_found().respond();
    };

    let trailers = accepts_trailers(request.headers());
    let forwarder = engine.forwarder(&host, &destination);
    tracing::debug!(service = %host, destination = %destination, "Forwarding to service");

    match forward_to(&forwarder, request, client_ip).await {
        Ok(response) => relay(response, trailers),
        Err(ForwardError::ClientDisconnected) => {
            tracing::debug!(host = %host, "Client disconnected, backend request aborted");
            bad_gateway(&ForwardError::ClientDisconnected)
        }
        Err(e) => {
            tracing::error!(host = %host, error = %error_chain(&e), "Upstream request failed");
            bad_gateway(&e)
        }
    }
}

/// Rewrite `request` for the forwarder's destination and perform the round
/// trip, racing it against the client-disconnect signal when one exists.
pub async fn forward_to(
    forwarder: &Forwarder,
    request: Request<Body>,
    client_ip: IpAddr,
) -> Result<Response<Incoming>, ForwardError> {
    let disconnected = request.disconnect_signal();
    let outbound = rewrite(request, forwarder.destination(), client_ip)?;
    let round_trip = forwarder.round_trip(outbound);

    match disconnected {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(ForwardError::ClientDisconnected),
            result = round_trip => result.map_err(ForwardError::from),
        },
        None => round_trip.await.map_err(ForwardError::from),
    }
}
