//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (request received, redirect, routing miss,
//!       transport error)
//!     → tracing.rs (request span with trace id and http.* fields)
//!
//! Consumers:
//!     → logging.rs (JSON or pretty lines on stdout)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id flows through every event of a request via its span

pub mod logging;
pub mod tracing;
