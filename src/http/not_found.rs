//! Response for hosts with no route.
//!
//! The 404 status goes out first. The fallback body is fetched lazily as
//! the client reads the body; any fetch or stream failure just ends the
//! body early.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Response, StatusCode};
use futures_util::{future, stream, StreamExt};

/// Writes 404 plus a best-effort fallback body.
#[derive(Debug, Clone)]
pub struct NotFoundResponder {
    client: reqwest::Client,
    fallback_url: Option<String>,
}

impl NotFoundResponder {
    pub fn new(fallback_url: Option<String>, fetch_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self {
            client,
            fallback_url,
        })
    }

    pub fn fallback_url(&self) -> Option<&str> {
        self.fallback_url.as_deref()
    }

    pub fn respond(&self) -> Response<Body> {
        let body = match &self.fallback_url {
            Some(url) => Body::from_stream(self.fallback_stream(url)),
            None => Body::empty(),
        };

        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
    }

    fn fallback_stream(
        &self,
        url: &str,
    ) -> impl futures_util::Stream<Item = reqwest::Result<Bytes>> + Send + 'static {
        let url = url.to_string();
        let fetch = self.client.get(url.as_str()).send();

        stream::once(fetch)
            .map(move |result| match result {
                Ok(response) => response.bytes_stream().left_stream(),
                Err(e) => {
                    tracing::debug!(error = %e, url = %url, "Fallback body fetch failed");
                    stream::empty::<reqwest::Result<Bytes>>().right_stream()
                }
            })
            .flatten()
            .take_while(|chunk| {
                if let Err(e) = chunk {
                    tracing::debug!(error = %e, "Fallback body stream ended early");
                }
                future::ready(chunk.is_ok())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_body_without_fallback() {
        let responder = NotFoundResponder::new(None, Duration::from_secs(1)).unwrap();
        let response = responder.respond();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn unreachable_fallback_leaves_body_empty() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let responder = NotFoundResponder::new(
            Some(format!("http://127.0.0.1:{port}/fallback.jpg")),
            Duration::from_secs(2),
        )
        .unwrap();

        let response = responder.respond();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}
