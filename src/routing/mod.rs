//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → table.rs (host lookup)
//!     → Return: Destination or not-found
//!
//! Route Registration (at startup):
//!     targets map
//!     → destination.rs (parse URL)
//!     → table.rs (exclusive insert)
//! ```
//!
//! # Design Decisions
//! - One destination per host; registering a host twice is an error
//! - Deterministic: same Host always resolves to the same destination

pub mod destination;
pub mod table;

pub use destination::Destination;
pub use table::{RouteError, RoutingTable};
