//! Signaling relay
//!
//! Stateless routing of negotiation messages on top of the registry. For
//! each message the relay resolves exactly one destination connection (or
//! the room, for chat), then forwards the payload verbatim. Session
//! descriptions and candidates are opaque [`serde_json::Value`]s; the relay
//! never inspects them.
//!
//! Routing failures are expected races (a broadcaster unpublishing mid
//! negotiation), so they are logged and the message is dropped. Nothing here
//! can fail a connection.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::hub::{ConnectionHub, ConnectionId};
use crate::protocol::ServerMessage;
use crate::registry::{StreamId, StreamRegistry};

/// Error type for relay routing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The stream has no broadcaster (it no longer exists)
    #[error("no broadcaster for stream: {0}")]
    NoBroadcaster(StreamId),

    /// A candidate carried neither an explicit target nor a stream id
    #[error("candidate has no resolvable destination")]
    NoRoute,

    /// Chat referenced a stream that does not exist
    #[error("unknown stream: {0}")]
    UnknownStream(StreamId),
}

/// Routes negotiation messages between broadcasters and viewers
pub struct SignalingRelay {
    registry: Arc<StreamRegistry>,
    hub: Arc<ConnectionHub>,
}

impl SignalingRelay {
    /// Create a relay over the given registry and hub
    pub fn new(registry: Arc<StreamRegistry>, hub: Arc<ConnectionHub>) -> Self {
        Self { registry, hub }
    }

    /// Route a session-description offer to the stream's broadcaster
    ///
    /// The forwarded message carries the sender's connection id so the
    /// broadcaster can target its answer. If the broadcaster is gone the
    /// offer is dropped and the sender is told the stream ended.
    pub async fn route_offer(
        &self,
        stream_id: &StreamId,
        sender: ConnectionId,
        offer: Value,
    ) -> Result<(), RelayError> {
        let Some(broadcaster) = self.registry.broadcaster_of(stream_id).await else {
            tracing::debug!(
                stream = %stream_id,
                connection_id = %sender,
                "Offer dropped: no broadcaster"
            );
            self.hub
                .send_to(
                    sender,
                    ServerMessage::StreamEnded {
                        stream_id: stream_id.clone(),
                    },
                )
                .await;
            return Err(RelayError::NoBroadcaster(stream_id.clone()));
        };

        self.hub
            .send_to(
                broadcaster,
                ServerMessage::Offer {
                    offer,
                    viewer_id: sender,
                    stream_id: stream_id.clone(),
                },
            )
            .await;

        tracing::debug!(
            stream = %stream_id,
            viewer = %sender,
            broadcaster = %broadcaster,
            "Offer forwarded"
        );

        Ok(())
    }

    /// Route a session-description answer to the viewer the broadcaster names
    ///
    /// The target is not validated against room membership: forwarding to a
    /// stale or disconnected id is a harmless no-op. Returns whether the
    /// answer was delivered.
    pub async fn route_answer(
        &self,
        target_viewer: ConnectionId,
        sender: ConnectionId,
        answer: Value,
    ) -> bool {
        let delivered = self
            .hub
            .send_to(
                target_viewer,
                ServerMessage::Answer {
                    answer,
                    broadcaster_id: sender,
                },
            )
            .await;

        if delivered {
            tracing::debug!(
                viewer = %target_viewer,
                broadcaster = %sender,
                "Answer forwarded"
            );
        } else {
            tracing::debug!(viewer = %target_viewer, "Answer dropped: target gone");
        }

        delivered
    }

    /// Route a connectivity candidate
    ///
    /// Two addressing modes: an explicit `target` (broadcaster to viewer), or
    /// implicit via `stream` resolved through the broadcaster index (viewer
    /// to broadcaster, before the viewer knows the broadcaster's id). When
    /// both are supplied the explicit target wins.
    pub async fn route_candidate(
        &self,
        sender: ConnectionId,
        candidate: Value,
        target: Option<ConnectionId>,
        stream: Option<&StreamId>,
    ) -> Result<(), RelayError> {
        let destination = match (target, stream) {
            (Some(target), _) => target,
            (None, Some(stream_id)) => match self.registry.broadcaster_of(stream_id).await {
                Some(broadcaster) => broadcaster,
                None => {
                    tracing::debug!(
                        stream = %stream_id,
                        connection_id = %sender,
                        "Candidate dropped: no broadcaster"
                    );
                    return Err(RelayError::NoBroadcaster(stream_id.clone()));
                }
            },
            (None, None) => {
                tracing::debug!(connection_id = %sender, "Candidate dropped: no route");
                return Err(RelayError::NoRoute);
            }
        };

        self.hub
            .send_to(
                destination,
                ServerMessage::IceCandidate {
                    candidate,
                    sender_id: sender,
                },
            )
            .await;

        Ok(())
    }

    /// Fan a chat message out to the stream's room
    ///
    /// The message gets a server-stamped RFC 3339 timestamp; an absent
    /// username falls back to the configured placeholder. No persistence.
    pub async fn broadcast_chat(
        &self,
        stream_id: &StreamId,
        message: String,
        username: Option<String>,
    ) -> Result<(), RelayError> {
        let Some(members) = self.registry.room_members(stream_id).await else {
            tracing::debug!(stream = %stream_id, "Chat dropped: unknown stream");
            return Err(RelayError::UnknownStream(stream_id.clone()));
        };

        let outbound = ServerMessage::ChatMessage {
            stream_id: stream_id.clone(),
            message,
            username: username
                .unwrap_or_else(|| self.registry.config().default_display_name.clone()),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        self.hub.send_to_many(&members, &outbound).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::registry::PublishRequest;

    struct Fixture {
        hub: Arc<ConnectionHub>,
        registry: Arc<StreamRegistry>,
        relay: SignalingRelay,
    }

    fn fixture() -> Fixture {
        let hub = Arc::new(ConnectionHub::new());
        let registry = Arc::new(StreamRegistry::new(Arc::clone(&hub)));
        let relay = SignalingRelay::new(Arc::clone(&registry), Arc::clone(&hub));
        Fixture {
            hub,
            registry,
            relay,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    async fn published(f: &Fixture, broadcaster: ConnectionId) -> StreamId {
        f.registry
            .publish(PublishRequest::default(), broadcaster)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_offer_reaches_broadcaster() {
        let f = fixture();
        let (b, mut rx_b) = f.hub.register().await;
        let (v, _rx_v) = f.hub.register().await;
        let id = published(&f, b).await;
        drain(&mut rx_b);

        f.relay
            .route_offer(&id, v, json!({ "sdp": "v=0" }))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx_b),
            vec![ServerMessage::Offer {
                offer: json!({ "sdp": "v=0" }),
                viewer_id: v,
                stream_id: id,
            }]
        );
    }

    #[tokio::test]
    async fn test_offer_without_broadcaster() {
        let f = fixture();
        let (v, mut rx_v) = f.hub.register().await;
        let missing = StreamId::from("stream_0_missing");

        let result = f.relay.route_offer(&missing, v, json!({})).await;

        assert_eq!(result, Err(RelayError::NoBroadcaster(missing.clone())));
        // The sender is told the stream is over; nothing else is forwarded
        assert_eq!(
            drain(&mut rx_v),
            vec![ServerMessage::StreamEnded { stream_id: missing }]
        );
    }

    #[tokio::test]
    async fn test_answer_reaches_viewer() {
        let f = fixture();
        let (b, _rx_b) = f.hub.register().await;
        let (v, mut rx_v) = f.hub.register().await;

        assert!(f.relay.route_answer(v, b, json!({ "sdp": "v=0" })).await);

        assert_eq!(
            drain(&mut rx_v),
            vec![ServerMessage::Answer {
                answer: json!({ "sdp": "v=0" }),
                broadcaster_id: b,
            }]
        );
    }

    #[tokio::test]
    async fn test_answer_to_stale_viewer_is_noop() {
        let f = fixture();
        let (b, _rx_b) = f.hub.register().await;

        assert!(!f.relay.route_answer(ConnectionId(404), b, json!({})).await);
    }

    #[tokio::test]
    async fn test_candidate_explicit_target() {
        let f = fixture();
        let (b, _rx_b) = f.hub.register().await;
        let (v, mut rx_v) = f.hub.register().await;

        f.relay
            .route_candidate(b, json!({ "candidate": "host" }), Some(v), None)
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx_v),
            vec![ServerMessage::IceCandidate {
                candidate: json!({ "candidate": "host" }),
                sender_id: b,
            }]
        );
    }

    #[tokio::test]
    async fn test_candidate_via_broadcaster_index() {
        let f = fixture();
        let (b, mut rx_b) = f.hub.register().await;
        let (v, _rx_v) = f.hub.register().await;
        let id = published(&f, b).await;
        drain(&mut rx_b);

        f.relay
            .route_candidate(v, json!({ "candidate": "srflx" }), None, Some(&id))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx_b),
            vec![ServerMessage::IceCandidate {
                candidate: json!({ "candidate": "srflx" }),
                sender_id: v,
            }]
        );
    }

    #[tokio::test]
    async fn test_candidate_explicit_target_wins() {
        let f = fixture();
        let (b, mut rx_b) = f.hub.register().await;
        let (v, mut rx_v) = f.hub.register().await;
        let id = published(&f, b).await;
        drain(&mut rx_b);
        drain(&mut rx_v);

        f.relay
            .route_candidate(b, json!({}), Some(v), Some(&id))
            .await
            .unwrap();

        assert_eq!(drain(&mut rx_v).len(), 1);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_candidate_without_route() {
        let f = fixture();
        let (v, _rx_v) = f.hub.register().await;

        assert_eq!(
            f.relay.route_candidate(v, json!({}), None, None).await,
            Err(RelayError::NoRoute)
        );
    }

    #[tokio::test]
    async fn test_chat_fans_out_to_room() {
        let f = fixture();
        let (b, _rx_b) = f.hub.register().await;
        let (v1, mut rx_v1) = f.hub.register().await;
        let (v2, mut rx_v2) = f.hub.register().await;
        let id = published(&f, b).await;
        f.registry.join(&id, v1).await.unwrap();
        f.registry.join(&id, v2).await.unwrap();
        drain(&mut rx_v1);
        drain(&mut rx_v2);

        f.relay
            .broadcast_chat(&id, "hello".to_owned(), None)
            .await
            .unwrap();

        for rx in [&mut rx_v1, &mut rx_v2] {
            match drain(rx).as_slice() {
                [ServerMessage::ChatMessage {
                    stream_id,
                    message,
                    username,
                    timestamp,
                }] => {
                    assert_eq!(stream_id, &id);
                    assert_eq!(message, "hello");
                    assert_eq!(username, "Anonymous");
                    assert!(timestamp.ends_with('Z'));
                }
                other => panic!("unexpected messages: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_chat_unknown_stream() {
        let f = fixture();
        let missing = StreamId::from("stream_0_missing");

        assert_eq!(
            f.relay
                .broadcast_chat(&missing, "hello".to_owned(), None)
                .await,
            Err(RelayError::UnknownStream(missing))
        );
    }
}
