//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (listener, TLS, hyper connection driver)
//!     → dispatch.rs (request span, method dispatch)
//!         CONNECT → tunnel.rs (dial, 200, hijack, byte pipe)
//!         other   → forward.rs
//!                     → routing table lookup (miss → not_found.rs)
//!                     → request.rs (director, header sanitization, XFF)
//!                     → cached forwarder round trip
//!                     → response.rs (relay minus hop-by-hop)
//!
//! Plain listener with TLS enforced:
//!     → redirect.rs (308 to https, no routing)
//! ```

pub mod capability;
pub mod dispatch;
pub mod forward;
pub mod headers;
pub mod not_found;
pub mod redirect;
pub mod request;
pub mod response;
pub mod server;
pub mod tunnel;

pub use forward::ForwardError;
pub use server::{ProxyServer, ServerError, ServerSettings};
pub use tunnel::TunnelError;
