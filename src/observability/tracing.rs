//! Request spans and trace correlation.
//!
//! # Responsibilities
//! - Mint a trace id per request
//! - Create the `request` span every request-scoped event is logged under
//!
//! # Design Decisions
//! - Trace ids are qualified with the project id when one is configured
//!   (`projects/<project>/traces/<id>`) so a log collector can link them
//! - Span fields use the `http.*` attribute names collectors already know

use axum::http::header::USER_AGENT;
use axum::http::Request;
use tracing::Span;
use uuid::Uuid;

use crate::http::request::request_host;

/// New trace id, qualified with `project_id` when it is non-empty.
pub fn trace_id(project_id: &str) -> String {
    let id = Uuid::new_v4().simple();
    if project_id.is_empty() {
        id.to_string()
    } else {
        format!("projects/{project_id}/traces/{id}")
    }
}

/// Span covering the handling of one request.
pub fn request_span<B>(request: &Request<B>, project_id: &str) -> Span {
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    tracing::info_span!(
        "request",
        trace = %trace_id(project_id),
        http.host = %request_host(request).unwrap_or_default(),
        http.method = %request.method(),
        http.path = %request.uri().path(),
        http.user_agent = %user_agent,
        http.url = %request.uri(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_is_project_qualified() {
        let id = trace_id("my-project");
        let suffix = id.strip_prefix("projects/my-project/traces/").unwrap();
        assert_eq!(suffix.len(), 32);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn bare_trace_id_without_project() {
        let id = trace_id("");
        assert_eq!(id.len(), 32);
        assert_ne!(id, trace_id(""));
    }
}
