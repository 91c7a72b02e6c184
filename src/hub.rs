//! Connection hub
//!
//! Tracks every live connection endpoint and owns the outbound half of its
//! message channel. The hub is the single place that knows how to reach a
//! connection by id; the registry and relay go through it for every
//! notification.
//!
//! Delivery is fire-and-forget with at-most-once semantics: a send to a
//! connection that has already torn down is a logged no-op, never an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

use crate::protocol::ServerMessage;

/// Process-unique identifier for one live connection endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of live connections and their outbound channels
pub struct ConnectionHub {
    /// Outbound sender per connection
    peers: RwLock<HashMap<ConnectionId, UnboundedSender<ServerMessage>>>,

    /// Next connection id to allocate
    next_id: AtomicU64,
}

impl ConnectionHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new connection
    ///
    /// Allocates a fresh connection id and returns it together with the
    /// receiving half of the connection's outbound channel. The caller is
    /// expected to drain the receiver into its transport and to call
    /// [`unregister`](Self::unregister) on teardown.
    pub async fn register(&self) -> (ConnectionId, UnboundedReceiver<ServerMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        self.peers.write().await.insert(id, tx);

        tracing::debug!(connection_id = %id, "Connection registered");

        (id, rx)
    }

    /// Remove a connection
    ///
    /// Safe to call for an id that was never registered or was already
    /// removed.
    pub async fn unregister(&self, id: ConnectionId) {
        if self.peers.write().await.remove(&id).is_some() {
            tracing::debug!(connection_id = %id, "Connection unregistered");
        }
    }

    /// Send a message to a single connection
    ///
    /// Returns `false` if the connection is unknown or its channel is closed.
    pub async fn send_to(&self, id: ConnectionId, message: ServerMessage) -> bool {
        let peers = self.peers.read().await;

        match peers.get(&id) {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    /// Send a message to each of the given connections
    ///
    /// Connections that are gone are skipped silently.
    pub async fn send_to_many(&self, ids: &[ConnectionId], message: &ServerMessage) {
        let peers = self.peers.read().await;

        for id in ids {
            if let Some(tx) = peers.get(id) {
                let _ = tx.send(message.clone());
            }
        }
    }

    /// Send a message to every live connection
    pub async fn broadcast(&self, message: &ServerMessage) {
        let peers = self.peers.read().await;

        for tx in peers.values() {
            let _ = tx.send(message.clone());
        }
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Whether the given connection is currently registered
    pub async fn is_connected(&self, id: ConnectionId) -> bool {
        self.peers.read().await.contains_key(&id)
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StreamId;

    fn ended(id: &str) -> ServerMessage {
        ServerMessage::StreamEnded {
            stream_id: StreamId::from(id),
        }
    }

    #[tokio::test]
    async fn test_register_allocates_unique_ids() {
        let hub = ConnectionHub::new();

        let (a, _rx_a) = hub.register().await;
        let (b, _rx_b) = hub.register().await;

        assert_ne!(a, b);
        assert_eq!(hub.connection_count().await, 2);
    }

    #[tokio::test]
    async fn test_send_to_delivers() {
        let hub = ConnectionHub::new();
        let (id, mut rx) = hub.register().await;

        assert!(hub.send_to(id, ended("s1")).await);
        assert_eq!(rx.recv().await.unwrap(), ended("s1"));
    }

    #[tokio::test]
    async fn test_send_to_unknown_is_noop() {
        let hub = ConnectionHub::new();

        assert!(!hub.send_to(ConnectionId(42), ended("s1")).await);
    }

    #[tokio::test]
    async fn test_send_to_closed_receiver() {
        let hub = ConnectionHub::new();
        let (id, rx) = hub.register().await;
        drop(rx);

        // The peer is gone but not yet unregistered: delivery fails quietly
        assert!(!hub.send_to(id, ended("s1")).await);
    }

    #[tokio::test]
    async fn test_send_to_many_skips_missing() {
        let hub = ConnectionHub::new();
        let (a, mut rx_a) = hub.register().await;
        let (b, mut rx_b) = hub.register().await;

        hub.send_to_many(&[a, b, ConnectionId(999)], &ended("s1"))
            .await;

        assert_eq!(rx_a.recv().await.unwrap(), ended("s1"));
        assert_eq!(rx_b.recv().await.unwrap(), ended("s1"));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let hub = ConnectionHub::new();
        let (_a, mut rx_a) = hub.register().await;
        let (_b, mut rx_b) = hub.register().await;
        let (_c, mut rx_c) = hub.register().await;

        hub.broadcast(&ended("s1")).await;

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            assert_eq!(rx.recv().await.unwrap(), ended("s1"));
        }
    }

    #[tokio::test]
    async fn test_unregister() {
        let hub = ConnectionHub::new();
        let (id, _rx) = hub.register().await;

        hub.unregister(id).await;

        assert!(!hub.is_connected(id).await);
        assert_eq!(hub.connection_count().await, 0);

        // Redundant unregister is a no-op
        hub.unregister(id).await;
    }
}
