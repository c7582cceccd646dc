//! Response relay and proxy-generated error responses.
//!
//! # Responsibilities
//! - Relay the backend response to the client, minus hop-by-hop headers
//! - Keep announced trailers working across the hop
//! - Map proxy-side failures to status codes with a plain-text diagnostic
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body; trailer frames
//!   flow through with the body
//! - When trailers are announced and the client sent `TE: trailers`,
//!   `Content-Length` is dropped so the response is sent chunked and the
//!   trailers have somewhere to go
//! - hyper's HTTP/1 server only writes trailer fields to clients that sent
//!   `TE: trailers`; for anyone else the announcement is dropped rather than
//!   promising fields that never arrive
//! - Error bodies carry the whole source chain, joined with ": "

use std::error::Error as StdError;

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRAILER};
use axum::http::{HeaderValue, Response, StatusCode};
use axum::BoxError;

use crate::http::headers::remove_hop_by_hop;

/// Prepare a backend response for the client.
///
/// `client_accepts_trailers` is whether the inbound request carried
/// `TE: trailers`.
pub fn relay<B>(response: Response<B>, client_accepts_trailers: bool) -> Response<Body>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (mut parts, body) = response.into_parts();

    let announced: Vec<HeaderValue> = parts.headers.get_all(TRAILER).iter().cloned().collect();
    remove_hop_by_hop(&mut parts.headers);

    if client_accepts_trailers && !announced.is_empty() {
        parts.headers.remove(CONTENT_LENGTH);
        for value in announced {
            parts.headers.append(TRAILER, value);
        }
    }

    parts.extensions.clear();
    Response::from_parts(parts, Body::new(body))
}

/// `err` followed by each of its sources, joined with ": ".
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

pub fn bad_gateway(err: &(dyn StdError + 'static)) -> Response<Body> {
    plain(StatusCode::BAD_GATEWAY, error_chain(err))
}

pub fn service_unavailable(err: &(dyn StdError + 'static)) -> Response<Body> {
    plain(StatusCode::SERVICE_UNAVAILABLE, error_chain(err))
}

/// The serving connection can't be taken over for a tunnel.
pub fn hijack_unsupported() -> Response<Body> {
    plain(StatusCode::INTERNAL_SERVER_ERROR, "Hijacking not supported".to_string())
}

fn plain(status: StatusCode, mut text: String) -> Response<Body> {
    text.push('\n');
    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn relay_strips_hop_by_hop() {
        let backend = Response::builder()
            .status(StatusCode::CREATED)
            .header("connection", "x-internal")
            .header("x-internal", "1")
            .header("keep-alive", "timeout=5")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let out = relay(backend, false);

        assert_eq!(out.status(), StatusCode::CREATED);
        assert_eq!(out.headers().len(), 1);
        assert_eq!(out.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn relay_reannounces_trailers_without_length() {
        let backend = Response::builder()
            .header("trailer", "X-Checksum")
            .header("content-length", "10")
            .header("transfer-encoding", "chunked")
            .body(Body::empty())
            .unwrap();

        let out = relay(backend, true);

        assert_eq!(out.headers()[TRAILER], "X-Checksum");
        assert!(out.headers().get(CONTENT_LENGTH).is_none());
        assert!(out.headers().get("transfer-encoding").is_none());
    }

    #[test]
    fn relay_keeps_length_without_trailers() {
        let backend = Response::builder()
            .header("content-length", "2")
            .body(Body::from("ok"))
            .unwrap();

        assert_eq!(relay(backend, true).headers()[CONTENT_LENGTH], "2");
    }

    #[test]
    fn relay_drops_announcement_when_client_refuses_trailers() {
        let backend = Response::builder()
            .header("trailer", "X-Checksum")
            .header("transfer-encoding", "chunked")
            .body(Body::empty())
            .unwrap();

        let out = relay(backend, false);

        assert!(out.headers().get(TRAILER).is_none());
        assert!(out.headers().get("transfer-encoding").is_none());
    }

    #[test]
    fn error_body_carries_source_chain() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(error_chain(&err), "outer: refused");

        let response = bad_gateway(&err);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn hijack_unsupported_is_500() {
        assert_eq!(hijack_unsupported().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
