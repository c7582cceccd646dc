//! Butler: a host-routed HTTP(S) reverse proxy.
//!
//! Requests are routed by their Host header to one static destination per
//! host. CONNECT requests are tunneled as opaque byte streams. The plain
//! listener can redirect everything to HTTPS when TLS is enforced, and a
//! separate raw-TCP mode relays fixed services without any HTTP handling.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ http::server ──▶ http::dispatch
//!                (TLS optional)                       │
//!                              ┌──────────────────────┴──────────┐
//!                              ▼                                 ▼
//!                        http::forward                     http::tunnel
//!                  routing table → upstream cache       dial → 200 → pipe
//!                  → rewrite → round trip → relay
//!
//!     Raw TCP mode:  net::tcp_tunnel ──▶ fixed remote (TLS optional) ──▶ net::pipe
//! ```

pub mod config;
pub mod engine;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod upstream;

pub use config::schema::ButlerConfig;
pub use engine::ProxyEngine;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
