//! Optional per-request capabilities exposed by the serving connection.
//!
//! The connection driver attaches what it supports as request extensions.
//! Handlers probe once per request; a missing capability means "no early
//! cancellation" or "cannot tunnel", never an error.

use axum::http::Request;
use hyper::upgrade::OnUpgrade;
use tokio_util::sync::CancellationToken;

use crate::net::connection::ClientDisconnect;

/// Can signal that the client went away before the response was ready.
pub trait Cancelable {
    fn disconnect_signal(&self) -> Option<CancellationToken>;
}

/// Can hand over the raw client connection once the response is sent.
pub trait Hijackable {
    fn take_upgrade(&mut self) -> Option<OnUpgrade>;
}

impl<B> Cancelable for Request<B> {
    fn disconnect_signal(&self) -> Option<CancellationToken> {
        self.extensions()
            .get::<ClientDisconnect>()
            .map(|signal| signal.0.clone())
    }
}

impl<B> Hijackable for Request<B> {
    fn take_upgrade(&mut self) -> Option<OnUpgrade> {
        self.extensions_mut().remove::<OnUpgrade>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_capabilities_are_none() {
        let mut req = Request::new(());
        assert!(req.disconnect_signal().is_none());
        assert!(req.take_upgrade().is_none());
    }

    #[test]
    fn disconnect_signal_follows_connection() {
        let lifetime = crate::net::connection::ConnectionLifetime::new();
        let mut req = Request::new(());
        req.extensions_mut().insert(lifetime.disconnect_signal());

        let token = req.disconnect_signal().unwrap();
        assert!(!token.is_cancelled());
        drop(lifetime);
        assert!(token.is_cancelled());
    }
}
