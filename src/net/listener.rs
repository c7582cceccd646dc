//! TCP listener implementation.
//!
//! # Responsibilities
//! - Bind to configured address(es)
//! - Accept incoming TCP connections
//! - Graceful handling of accept errors
//!
//! # Design Decisions
//! - No admission control: every accepted connection gets its own task.
//!   Unbounded concurrency is a known limitation.
//! - Only bind failures are fatal; accept failures are logged and retried

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

/// Pause after a failed accept so persistent errors don't spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A bound TCP listener.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    label: &'static str,
}

impl Listener {
    /// Bind to the given address.
    pub async fn bind(addr: SocketAddr, label: &'static str) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind { addr, source };

        let inner = TcpListener::bind(addr).await.map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::info!(address = %local_addr, listener = label, "Listener bound");

        Ok(Self {
            inner,
            local_addr,
            label,
        })
    }

    /// Accept the next connection.
    ///
    /// Accept failures are logged and the loop continues; this never
    /// returns an error.
    pub async fn accept(&self) -> (TcpStream, SocketAddr) {
        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!(peer_addr = %peer, listener = self.label, "Connection accepted");
                    return (stream, peer);
                }
                Err(e) => {
                    tracing::error!(error = %e, listener = self.label, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_reports_local_addr() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), "test")
            .await
            .unwrap();
        assert_ne!(listener.local_addr().port(), 0);

        let addr = listener.local_addr();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (_stream, peer) = listener.accept().await;
        let client = client.await.unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn bind_conflict_is_an_error() {
        let first = Listener::bind("127.0.0.1:0".parse().unwrap(), "first")
            .await
            .unwrap();
        let err = Listener::bind(first.local_addr(), "second").await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }
}
