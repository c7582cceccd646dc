//! Request entry points for the listeners.
//!
//! `dispatch` serves routed traffic: CONNECT goes to the tunnel, every other
//! method to the forwarding engine. `enforce_https` serves the plain
//! listener when TLS is enforced.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::response::Response;
use tracing::Instrument;

use crate::engine::ProxyEngine;
use crate::http::forward::forward;
use crate::http::redirect::RedirectPolicy;
use crate::http::tunnel::tunnel;
use crate::observability::tracing::request_span;

pub async fn dispatch(
    State(engine): State<Arc<ProxyEngine>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let span = request_span(&request, engine.project_id());
    async move {
        tracing::info!(peer_addr = %peer, "Handling HTTP request");
        if request.method() == Method::CONNECT {
            tunnel(&engine, request).await
        } else {
            forward(&engine, request, peer.ip()).await
        }
    }
    .instrument(span)
    .await
}

/// State for the enforcing plain listener.
#[derive(Debug, Clone)]
pub struct Redirector {
    pub policy: RedirectPolicy,
    pub project_id: Arc<str>,
}

pub async fn enforce_https(State(redirector): State<Redirector>, request: Request) -> Response {
    let span = request_span(&request, &redirector.project_id);
    let _entered = span.enter();
    tracing::info!("Handling HTTP request");
    redirector.policy.respond(&request)
}
