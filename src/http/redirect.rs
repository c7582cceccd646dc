//! HTTP → HTTPS enforcement for the plain listener.
//!
//! Every request gets a permanent redirect to the https equivalent of the
//! same host, path and query. The routing table is never consulted.

use axum::body::Body;
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, Request, Response, StatusCode};

use crate::http::request::{addressed_host, strip_port};

const DEFAULT_HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectPolicy {
    secure_port: u16,
}

impl RedirectPolicy {
    /// Redirect to the secure listener on `secure_port`.
    pub fn new(secure_port: u16) -> Self {
        Self { secure_port }
    }

    /// `https://host[:port]/path?query` for `request`, or `None` when the
    /// request names no host.
    pub fn location<B>(&self, request: &Request<B>) -> Option<String> {
        let host = strip_port(addressed_host(request)?);

        let mut location = if self.secure_port == DEFAULT_HTTPS_PORT {
            format!("https://{host}")
        } else {
            format!("https://{host}:{}", self.secure_port)
        };
        location.push_str(request.uri().path());
        if let Some(query) = request.uri().query() {
            location.push('?');
            location.push_str(query);
        }
        Some(location)
    }

    pub fn respond<B>(&self, request: &Request<B>) -> Response<Body> {
        let location = self
            .location(request)
            .and_then(|l| HeaderValue::from_str(&l).ok());

        let Some(location) = location else {
            let mut response = Response::new(Body::from("missing Host header\n"));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return response;
        };

        tracing::info!(location = ?location, "Redirecting to HTTPS");
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::PERMANENT_REDIRECT;
        response.headers_mut().insert(LOCATION, location);
        response
    }
}
