//! Virtual host lookup.
//!
//! # Responsibilities
//! - Store host → destination mappings
//! - Look up the destination for a request's Host
//! - Refuse to overwrite an existing mapping
//!
//! # Design Decisions
//! - Host matching is case-insensitive, as HTTP hosts are
//! - A single mutex guards both reads and writes; mutation is rare and the
//!   lock is never held across I/O
//! - Explicit not-found (`None`) rather than a silent default

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::routing::destination::Destination;

/// Error type for route registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("duplicate route for host {host:?} (already mapped to {existing})")]
    DuplicateRoute { host: String, existing: String },
}

/// Mapping of virtual host → destination.
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: Mutex<HashMap<String, Destination>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route. Fails if `host` is already mapped; the existing
    /// destination is kept.
    pub fn put(&self, host: &str, destination: Destination) -> Result<(), RouteError> {
        let key = normalize(host);
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = routes.get(&key) {
            return Err(RouteError::DuplicateRoute {
                host: key,
                existing: existing.to_string(),
            });
        }

        routes.insert(key, destination);
        Ok(())
    }

    /// Destination for `host`, if any.
    pub fn get(&self, host: &str) -> Option<Destination> {
        let routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.get(&normalize(host)).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(host: &str) -> String {
    host.trim().to_ascii_lowercase()
}
