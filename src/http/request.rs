//! Outbound request rewriting.
//!
//! # Responsibilities
//! - Extract routing-relevant information (host)
//! - Point the request at the destination (scheme, authority, joined path,
//!   merged query, Host header)
//! - Sanitize headers and chain `X-Forwarded-For`
//!
//! # Design Decisions
//! - Headers and body are moved, not copied; the body streams through
//! - A missing User-Agent is sent as an explicit empty value so the backend
//!   never sees the client library's default
//! - Outbound requests are HTTP/1.1; the pooled backend client speaks h1

use std::net::IpAddr;

use axum::body::Body;
use axum::http::header::{HOST, TE, USER_AGENT};
use axum::http::{HeaderValue, Request, Uri, Version};

use crate::http::forward::ForwardError;
use crate::http::headers::{accepts_trailers, append_forwarded_for, remove_hop_by_hop};
use crate::routing::Destination;

/// Host the client addressed, as written: the `Host` header, else the URI
/// authority.
pub fn addressed_host<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .map(str::trim)
        .filter(|host| !host.is_empty())
}

/// [`addressed_host`], lowercased for routing.
pub fn request_host<B>(request: &Request<B>) -> Option<String> {
    addressed_host(request).map(str::to_ascii_lowercase)
}

/// Host without its port. IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Join two path segments with exactly one slash between them.
pub fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{a}{}", &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}

/// Destination query first, then the request's; `&` only when both exist.
pub fn merge_query(base: &str, request: &str) -> String {
    if base.is_empty() || request.is_empty() {
        format!("{base}{request}")
    } else {
        format!("{base}&{request}")
    }
}

/// Rewrite an inbound request for `destination`.
pub fn rewrite(
    request: Request<Body>,
    destination: &Destination,
    client_ip: IpAddr,
) -> Result<Request<Body>, ForwardError> {
    let invalid = |source| ForwardError::InvalidDestination {
        destination: destination.to_string(),
        source,
    };

    let authority = destination.authority().ok_or_else(|| invalid(None))?;
    let (mut parts, body) = request.into_parts();

    let path = single_joining_slash(destination.path(), parts.uri.path());
    let query = merge_query(destination.query(), parts.uri.query().unwrap_or(""));
    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    };

    parts.uri = Uri::builder()
        .scheme(destination.scheme())
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| invalid(Some(e)))?;

    let trailers_accepted = accepts_trailers(&parts.headers);
    remove_hop_by_hop(&mut parts.headers);
    if trailers_accepted {
        parts.headers.insert(TE, HeaderValue::from_static("trailers"));
    }

    let host = HeaderValue::from_str(&authority).map_err(|e| invalid(Some(e.into())))?;
    parts.headers.insert(HOST, host);
    if !parts.headers.contains_key(USER_AGENT) {
        parts.headers.insert(USER_AGENT, HeaderValue::from_static(""));
    }

    append_forwarded_for(&mut parts.headers, client_ip);
    parts.version = Version::HTTP_11;

    Ok(Request::from_parts(parts, body))
}
