//! Upstream (backend) side of the proxy.
//!
//! # Data Flow
//! ```text
//! host + Destination
//!     → cache.rs (get or build, once per host)
//!     → transport.rs (Forwarder: pooled client for that host)
//!     → connector.rs (dial + TLS under a deadline)
//!     → backend
//! ```

pub mod cache;
pub mod connector;
pub mod transport;

pub use cache::ProxyCache;
pub use connector::BackendConnector;
pub use transport::{Forwarder, UpstreamSettings};
