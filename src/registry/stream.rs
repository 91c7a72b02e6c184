//! Stream identity and record types
//!
//! This module defines the per-stream data stored in the registry: the opaque
//! stream identifier, the immutable record created at publish time, and the
//! serializable snapshot handed to listings and discovery announcements.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hub::ConnectionId;
use crate::protocol::constants::{STREAM_ID_PREFIX, STREAM_ID_SUFFIX_LEN};

/// Opaque unique identifier for a published stream
///
/// Generated ids have the shape `stream_<unix-millis>_<random base-36>`,
/// collision-resistant within the registry's lifetime. Ids are not a security
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        Self(format!(
            "{}_{}_{}",
            STREAM_ID_PREFIX,
            millis,
            base36_suffix(STREAM_ID_SUFFIX_LEN)
        ))
    }

    /// View the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for StreamId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn base36_suffix(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Immutable metadata of a published stream
#[derive(Debug, Clone)]
pub struct StreamRecord {
    /// Stream identifier, never reused
    pub id: StreamId,

    /// Display title
    pub title: String,

    /// Broadcaster display name
    pub broadcaster_name: String,

    /// Creation time, set once at publish
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view of a stream, as served by listings and announcements
///
/// `viewer_count` is derived from room membership at snapshot time; it is
/// never stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub id: StreamId,

    pub title: String,

    #[serde(rename = "streamer")]
    pub broadcaster_name: String,

    #[serde(rename = "viewers")]
    pub viewer_count: usize,

    pub created_at: DateTime<Utc>,
}

/// Parameters for publishing a stream
///
/// Absent fields fall back to the registry's configured placeholders; an
/// absent `stream_id` gets a generated one.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// Externally-supplied stream id, if the caller minted one
    pub stream_id: Option<StreamId>,

    /// Display title
    pub title: Option<String>,

    /// Broadcaster display name
    pub broadcaster_name: Option<String>,
}

/// Registry-internal state of one stream: record, room, and broadcaster
///
/// The three live and die together, which is what makes publish and
/// broadcaster-assignment a single atomic step: an entry without a
/// broadcaster cannot be represented.
pub(crate) struct StreamEntry {
    /// Immutable stream metadata
    pub(crate) record: StreamRecord,

    /// The one connection allowed to unpublish this stream
    pub(crate) broadcaster: ConnectionId,

    /// Room membership: every connection currently joined, broadcaster
    /// included once it joins its own room
    pub(crate) members: HashSet<ConnectionId>,
}

impl StreamEntry {
    /// Create an entry with an empty room
    pub(crate) fn new(record: StreamRecord, broadcaster: ConnectionId) -> Self {
        Self {
            record,
            broadcaster,
            members: HashSet::new(),
        }
    }

    /// Current viewer count (room size)
    pub(crate) fn viewer_count(&self) -> usize {
        self.members.len()
    }

    /// Room membership as an owned list, for targeting notifications
    pub(crate) fn member_list(&self) -> Vec<ConnectionId> {
        self.members.iter().copied().collect()
    }

    /// Point-in-time snapshot of this stream
    pub(crate) fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            id: self.record.id.clone(),
            title: self.record.title.clone(),
            broadcaster_name: self.record.broadcaster_name.clone(),
            viewer_count: self.viewer_count(),
            created_at: self.record.created_at,
        }
    }
}
