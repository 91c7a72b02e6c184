//! Server statistics
//!
//! Counters backing the health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Server-wide statistics
pub struct ServerStats {
    /// When the server was created
    started_at: Instant,

    /// Total connections ever accepted
    total_connections: AtomicU64,

    /// Currently open connections
    active_connections: AtomicU64,
}

impl ServerStats {
    /// Create a new stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
        }
    }

    /// Record an opened connection
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed connection
    pub fn connection_closed(&self) {
        // Saturating: a redundant close must not wrap the counter
        self.active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            })
            .ok();
    }

    /// Time since the server was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Total connections ever accepted
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Currently open connections
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}
