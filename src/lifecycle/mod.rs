//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Build engine → Load TLS → Bind listeners → Serve
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every waiter resolves → listeners stop accepting
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → resolve the shutdown future passed to startup
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - The serving call returns on the first listener exit or on shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, StartupError};
