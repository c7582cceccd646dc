//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → tls.rs (optional TLS handshake)
//!     → connection.rs (connection id, disconnect signal)
//!     → Hand off to HTTP layer
//!
//! Raw TCP mode:
//!     → tcp_tunnel.rs (dial fixed remote, optionally over TLS)
//!     → pipe.rs (bidirectional copy, half-close)
//! ```
//!
//! # Design Decisions
//! - Accept errors never stop a listener; bind errors are fatal
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod pipe;
pub mod tcp_tunnel;
pub mod tls;

pub use tcp_tunnel::{TcpTunnelError, TcpTunnels};
