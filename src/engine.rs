//! The proxy engine instance.
//!
//! # Responsibilities
//! - Own the routing table and the per-host forwarder cache
//! - Hold the settings every forwarder is built with
//! - Own the not-found responder and trace project id
//!
//! # Design Decisions
//! - Built once at startup and shared as `Arc<ProxyEngine>`; no globals
//! - Routes are registered through `RoutingTable::put`, so a host that
//!   appears twice (after case folding) fails startup
//! - The backend TLS client config is built once and shared by every
//!   forwarder

use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;

use crate::config::ButlerConfig;
use crate::http::not_found::NotFoundResponder;
use crate::net::tls::{self, TlsError};
use crate::routing::{Destination, RouteError, RoutingTable};
use crate::upstream::{Forwarder, ProxyCache, UpstreamSettings};

/// Error type for engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("invalid destination {value:?} for host {host:?}")]
    Destination {
        host: String,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to set up backend TLS")]
    Tls(#[from] TlsError),

    #[error("failed to build fallback body client")]
    FallbackClient(#[source] reqwest::Error),
}

/// Everything the engine needs besides routes.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub upstream: UpstreamSettings,
    pub tunnel_dial_timeout: Duration,
    pub fallback_url: Option<String>,
    pub fallback_timeout: Duration,
    pub project_id: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            upstream: UpstreamSettings::default(),
            tunnel_dial_timeout: Duration::from_secs(10),
            fallback_url: None,
            fallback_timeout: Duration::from_secs(10),
            project_id: String::new(),
        }
    }
}

impl From<&ButlerConfig> for EngineSettings {
    fn from(config: &ButlerConfig) -> Self {
        Self {
            upstream: UpstreamSettings::from(&config.upstream),
            tunnel_dial_timeout: Duration::from_secs(config.tunnel.dial_timeout_secs),
            fallback_url: config.not_found.fallback_url.clone(),
            fallback_timeout: Duration::from_secs(config.not_found.fetch_timeout_secs),
            project_id: config.observability.project_id.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ProxyEngine {
    routes: RoutingTable,
    proxies: ProxyCache<Forwarder>,
    upstream: UpstreamSettings,
    backend_tls: Arc<ClientConfig>,
    not_found: NotFoundResponder,
    tunnel_dial_timeout: Duration,
    project_id: String,
}

impl ProxyEngine {
    /// Engine with an empty routing table.
    pub fn new(settings: EngineSettings) -> Result<Self, EngineError> {
        let backend_tls = tls::client_config(settings.upstream.insecure_skip_verify)?;
        if settings.upstream.insecure_skip_verify {
            tracing::warn!("Backend TLS certificate verification is disabled");
        }

        let not_found = NotFoundResponder::new(settings.fallback_url, settings.fallback_timeout)
            .map_err(EngineError::FallbackClient)?;

        Ok(Self {
            routes: RoutingTable::new(),
            proxies: ProxyCache::new(),
            upstream: settings.upstream,
            backend_tls,
            not_found,
            tunnel_dial_timeout: settings.tunnel_dial_timeout,
            project_id: settings.project_id,
        })
    }

    /// Engine with every configured target registered.
    pub fn from_config(config: &ButlerConfig) -> Result<Self, EngineError> {
        let engine = Self::new(EngineSettings::from(config))?;
        for (host, target) in &config.targets {
            engine.add_route(host, target)?;
        }

        tracing::info!(routes = engine.routes.len(), "Routing table loaded");
        Ok(engine)
    }

    /// Parse `target` and map `host` to it.
    pub fn add_route(&self, host: &str, target: &str) -> Result<(), EngineError> {
        let destination = Destination::parse(target).map_err(|source| EngineError::Destination {
            host: host.to_string(),
            value: target.to_string(),
            source,
        })?;

        self.routes.put(host, destination)?;
        tracing::debug!(host = %host, destination = %target, "Route registered");
        Ok(())
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Cached forwarder for `host`, built on first use.
    pub fn forwarder(&self, host: &str, destination: &Destination) -> Arc<Forwarder> {
        self.proxies.get_or_insert_with(host, || {
            Forwarder::new(destination.clone(), &self.upstream, &self.backend_tls)
        })
    }

    /// Number of hosts with a built forwarder.
    pub fn cached_proxies(&self) -> usize {
        self.proxies.len()
    }

    pub fn not_found(&self) -> &NotFoundResponder {
        &self.not_found
    }

    pub fn backend_tls(&self) -> &Arc<ClientConfig> {
        &self.backend_tls
    }

    pub fn tunnel_dial_timeout(&self) -> Duration {
        self.tunnel_dial_timeout
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}
