//! Per-host forwarder cache.
//!
//! # Responsibilities
//! - Hold at most one forwarder per virtual host
//! - Build it lazily on the first request for that host
//!
//! # Design Decisions
//! - Check and insert happen under one lock, so concurrent first requests
//!   build exactly one forwarder
//! - Construction does no I/O, so holding the lock while building never
//!   blocks other hosts behind a slow backend
//! - Entries are immutable once built and handed out as `Arc`

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Memoized values keyed by host.
#[derive(Debug)]
pub struct ProxyCache<T> {
    entries: Mutex<HashMap<String, Arc<T>>>,
}

impl<T> ProxyCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value for `host`, building it with `build` if absent.
    pub fn get_or_insert_with<F>(&self, host: &str, build: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(host) {
            return Arc::clone(existing);
        }

        tracing::debug!(host = %host, "Building forwarder");
        let value = Arc::new(build());
        entries.insert(host.to_string(), Arc::clone(&value));
        value
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ProxyCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
