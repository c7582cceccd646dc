//! Connection identity and lifecycle signals.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Signal the end of a client connection to in-flight requests

use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::{CancellationToken, DropGuard};

/// Global counter for connection IDs; only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Request extension carrying the client-disconnect signal of the
/// connection the request arrived on.
#[derive(Debug, Clone)]
pub struct ClientDisconnect(pub CancellationToken);

/// Owned by the connection driver; fires the disconnect signal when the
/// connection ends, whichever way it ends.
#[derive(Debug)]
pub struct ConnectionLifetime {
    token: CancellationToken,
    _guard: DropGuard,
}

impl ConnectionLifetime {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        Self {
            token,
            _guard: guard,
        }
    }

    /// Extension to attach to each request served on this connection.
    pub fn disconnect_signal(&self) -> ClientDisconnect {
        ClientDisconnect(self.token.clone())
    }
}

impl Default for ConnectionLifetime {
    fn default() -> Self {
        Self::new()
    }
}
