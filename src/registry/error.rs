//! Registry error types
//!
//! Error types for stream registry operations. All of these are recovered
//! locally by callers: logged, dropped, never allowed to tear down a
//! connection.

use thiserror::Error;

use super::stream::StreamId;
use crate::hub::ConnectionId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Operation referenced a stream that does not exist (benign race)
    #[error("unknown stream: {0}")]
    UnknownStream(StreamId),

    /// Caller tried to unpublish a stream it does not broadcast
    #[error("connection {caller} is not the broadcaster of stream {stream_id}")]
    NotBroadcaster {
        stream_id: StreamId,
        caller: ConnectionId,
    },

    /// Externally-supplied stream id is already owned by another connection
    #[error("stream id already in use: {0}")]
    DuplicateStream(StreamId),
}
