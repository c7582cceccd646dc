//! Outbound connector with a connect deadline.
//!
//! Wraps the rustls-capable HTTP connector so that dialing plus the TLS
//! handshake must finish within `dial_timeout + tls_handshake_timeout`.
//! The dial alone is additionally bounded by the inner `HttpConnector`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::Uri;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::ClientConfig;
use tower::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connector used by every forwarder.
#[derive(Debug, Clone)]
pub struct BackendConnector {
    inner: HttpsConnector<HttpConnector>,
    deadline: Duration,
}

impl BackendConnector {
    pub fn new(
        tls: &Arc<ClientConfig>,
        dial_timeout: Duration,
        keep_alive: Duration,
        tls_handshake_timeout: Duration,
    ) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(dial_timeout));
        http.set_keepalive(Some(keep_alive));

        let inner = HttpsConnectorBuilder::new()
            .with_tls_config(ClientConfig::clone(tls))
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        Self {
            inner,
            deadline: dial_timeout + tls_handshake_timeout,
        }
    }
}

/// Connect deadline elapsed.
#[derive(Debug, thiserror::Error)]
#[error("backend connect timed out after {0:?}")]
pub struct ConnectTimeout(pub Duration);

impl Service<Uri> for BackendConnector {
    type Response = <HttpsConnector<HttpConnector> as Service<Uri>>::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let deadline = self.deadline;
        let connecting = self.inner.call(uri);
        Box::pin(async move {
            match tokio::time::timeout(deadline, connecting).await {
                Ok(result) => result,
                Err(_) => Err(Box::new(ConnectTimeout(deadline)) as BoxError),
            }
        })
    }
}
