//! HTTP(S) listener management.
//!
//! # Responsibilities
//! - Load TLS material and bind the plain and secure listeners
//! - Pick the plain listener's behavior (forward, or redirect when TLS is
//!   enforced)
//! - Drive each accepted connection with HTTP/1.1, HTTP/2 and upgrades
//! - Attach the connection's capabilities (peer address, disconnect
//!   signal, upgrade handle) to every request
//!
//! # Design Decisions
//! - TLS is loaded before anything binds, so bad material never leaves a
//!   half-started server behind
//! - One task per connection; no admission control
//! - `run_until` returns when the first listener task ends or shutdown
//!   fires; the remaining listener is aborted when the task set drops,
//!   in-flight connection tasks are left to finish on their own

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::engine::ProxyEngine;
use crate::http::dispatch::{dispatch, enforce_https, Redirector};
use crate::http::redirect::RedirectPolicy;
use crate::net::connection::{ConnectionId, ConnectionLifetime};
use crate::net::listener::{Listener, ListenerError};
use crate::net::tls::{server_config, TlsError, TlsMaterial};

/// Error type for the HTTP(S) listeners.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("TLS setup failed")]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("{0} listener stopped")]
    ListenerExited(&'static str),

    #[error("listener task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Where to listen and with what TLS material.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_address: SocketAddr,
    pub secure_bind_address: SocketAddr,
    pub tls: Option<TlsMaterial>,
}

/// The bound HTTP(S) listeners of one proxy instance.
pub struct ProxyServer {
    plain: BoundListener,
    secure: Option<BoundListener>,
}

struct BoundListener {
    listener: Listener,
    router: Router,
    tls: Option<TlsAcceptor>,
}

impl ProxyServer {
    /// Load TLS (if any) and bind every listener.
    pub async fn bind(engine: Arc<ProxyEngine>, settings: ServerSettings) -> Result<Self, ServerError> {
        let tls = match &settings.tls {
            Some(material) => Some((server_config(material)?, material.enforce)),
            None => None,
        };

        let secure = match &tls {
            Some((config, _)) => Some(BoundListener {
                listener: Listener::bind(settings.secure_bind_address, "secure").await?,
                router: proxy_router(Arc::clone(&engine)),
                tls: Some(TlsAcceptor::from(Arc::clone(config))),
            }),
            None => None,
        };

        let plain_router = match (&tls, &secure) {
            (Some((_, true)), Some(secure)) => {
                let policy = RedirectPolicy::new(secure.listener.local_addr().port());
                redirect_router(policy, engine.project_id())
            }
            _ => proxy_router(Arc::clone(&engine)),
        };

        let plain = BoundListener {
            listener: Listener::bind(settings.bind_address, "plain").await?,
            router: plain_router,
            tls: None,
        };

        Ok(Self { plain, secure })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.plain.listener.local_addr()
    }

    pub fn secure_addr(&self) -> Option<SocketAddr> {
        self.secure.as_ref().map(|s| s.listener.local_addr())
    }

    /// Serve until a listener stops.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until a listener stops or `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let mut listeners = JoinSet::new();
        listeners.spawn(self.plain.serve());
        if let Some(secure) = self.secure {
            listeners.spawn(secure.serve());
        }

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown requested, closing HTTP listeners");
                Ok(())
            }
            Some(exited) = listeners.join_next() => {
                let label = exited?;
                tracing::error!(listener = label, "Listener stopped");
                Err(ServerError::ListenerExited(label))
            }
        }
    }
}

fn proxy_router(engine: Arc<ProxyEngine>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
}

fn redirect_router(policy: RedirectPolicy, project_id: &str) -> Router {
    let redirector = Redirector {
        policy,
        project_id: Arc::from(project_id),
    };
    Router::new()
        .fallback(enforce_https)
        .with_state(redirector)
        .layer(TraceLayer::new_for_http())
}

impl BoundListener {
    async fn serve(self) -> &'static str {
        let Self {
            listener,
            router,
            tls,
        } = self;
        tracing::info!(address = %listener.local_addr(), listener = listener.label(), "Accepting connections");

        loop {
            let (stream, peer) = listener.accept().await;
            let router = router.clone();
            let tls = tls.clone();
            let span = tracing::debug_span!(
                "connection",
                id = %ConnectionId::new(),
                peer_addr = %peer,
                listener = listener.label(),
            );

            tokio::spawn(
                async move {
                    match tls {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(stream) => serve_connection(stream, peer, router).await,
                            Err(e) => tracing::debug!(error = %e, "TLS handshake failed"),
                        },
                        None => serve_connection(stream, peer, router).await,
                    }
                }
                .instrument(span),
            );
        }
    }
}

async fn serve_connection<I>(io: I, peer: SocketAddr, router: Router)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let lifetime = ConnectionLifetime::new();
    let disconnect = lifetime.disconnect_signal();

    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        request.extensions_mut().insert(disconnect.clone());
        let router = router.clone();
        async move {
            let response: Result<Response<Body>, Infallible> = router.oneshot(request).await;
            response
        }
    });

    let served = auto::Builder::new(TokioExecutor::new())
        .serve_connection_with_upgrades(TokioIo::new(io), service)
        .await;
    if let Err(e) = served {
        tracing::debug!(error = %e, "Connection closed with error");
    }

    drop(lifetime);
}
