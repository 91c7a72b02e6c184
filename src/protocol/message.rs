//! Signaling wire messages
//!
//! JSON messages exchanged with connected clients. Every message is an object
//! with a `type` tag (kebab-case, e.g. `"join-stream"`) and camelCase payload
//! fields. Session descriptions and ICE candidates are carried as opaque
//! [`serde_json::Value`]s and forwarded without inspection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hub::ConnectionId;
use crate::registry::{StreamId, StreamSnapshot};

/// Message received from a connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Publish a stream. The caller becomes its broadcaster.
    StartStream {
        /// Externally-supplied stream id; a fresh id is generated when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<StreamId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Broadcaster display name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        streamer: Option<String>,
    },

    /// Unpublish a stream. Only honored for its broadcaster.
    StopStream { stream_id: StreamId },

    /// Join a stream's room
    JoinStream { stream_id: StreamId },

    /// Leave a stream's room
    LeaveStream { stream_id: StreamId },

    /// Session description offer, routed to the stream's broadcaster
    Offer { stream_id: StreamId, offer: Value },

    /// Session description answer, routed to the given viewer
    Answer { viewer_id: ConnectionId, answer: Value },

    /// Connectivity candidate. Addressed either explicitly (`target_id`) or
    /// implicitly via the stream's broadcaster (`stream_id`); `target_id`
    /// wins when both are present.
    IceCandidate {
        candidate: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<ConnectionId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<StreamId>,
    },

    /// Chat message, fanned out to the stream's room
    ChatMessage {
        stream_id: StreamId,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
}

/// Message delivered to a connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Hello message carrying the connection's identifier
    Connected { connection_id: ConnectionId },

    /// Publish acknowledgement, sent to the broadcaster only
    StreamStarted { stream_id: StreamId },

    /// A stream became discoverable (sent to every connection)
    NewStream { stream: StreamSnapshot },

    /// A stream is no longer discoverable (sent to every connection)
    StreamRemoved { stream_id: StreamId },

    /// The stream's broadcaster is gone (sent to the room, and to the sender
    /// of an offer that could not be routed)
    StreamEnded { stream_id: StreamId },

    /// Room membership changed (sent to the room)
    ViewerCount { stream_id: StreamId, count: usize },

    /// Forwarded offer; `viewer_id` is the sender, for targeting the answer
    Offer {
        offer: Value,
        viewer_id: ConnectionId,
        stream_id: StreamId,
    },

    /// Forwarded answer
    Answer {
        answer: Value,
        broadcaster_id: ConnectionId,
    },

    /// Forwarded connectivity candidate
    IceCandidate {
        candidate: Value,
        sender_id: ConnectionId,
    },

    /// Chat fan-out with a server-stamped RFC 3339 timestamp
    ChatMessage {
        stream_id: StreamId,
        message: String,
        username: String,
        timestamp: String,
    },
}
