//! Per-host forwarding transport.
//!
//! # Responsibilities
//! - Hold the outbound client bound to one destination
//! - Carry the fixed dial/keep-alive/handshake settings it was built with
//!
//! # Design Decisions
//! - Building a forwarder is infallible and does no I/O; connections are
//!   opened lazily on the first round trip and pooled afterwards
//! - No retries: a failed round trip is reported to the caller as is

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::ClientConfig;

use crate::config::UpstreamConfig;
use crate::routing::Destination;
use crate::upstream::connector::BackendConnector;

/// Dial and TLS settings shared by every forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamSettings {
    pub dial_timeout: Duration,
    pub keep_alive: Duration,
    pub tls_handshake_timeout: Duration,
    /// Skip backend certificate verification. Off unless configured.
    pub insecure_skip_verify: bool,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(30),
            keep_alive: Duration::from_secs(30),
            tls_handshake_timeout: Duration::from_secs(10),
            insecure_skip_verify: false,
        }
    }
}

impl From<&UpstreamConfig> for UpstreamSettings {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            dial_timeout: config.dial_timeout(),
            keep_alive: config.keep_alive(),
            tls_handshake_timeout: config.tls_handshake_timeout(),
            insecure_skip_verify: config.insecure_skip_verify,
        }
    }
}

/// Outbound transport for one virtual host.
#[derive(Debug)]
pub struct Forwarder {
    client: Client<BackendConnector, Body>,
    destination: Destination,
}

impl Forwarder {
    pub fn new(destination: Destination, settings: &UpstreamSettings, tls: &Arc<ClientConfig>) -> Self {
        let connector = BackendConnector::new(
            tls,
            settings.dial_timeout,
            settings.keep_alive,
            settings.tls_handshake_timeout,
        );

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(settings.keep_alive)
            .build(connector);

        Self { client, destination }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Send an already rewritten request to the backend.
    pub async fn round_trip(
        &self,
        request: Request<Body>,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        self.client.request(request).await
    }
}
