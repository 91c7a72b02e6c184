//! Protocol constants

/// Default port for the signaling server
pub const DEFAULT_PORT: u16 = 3000;

/// WebSocket upgrade path served by the listener
pub const WEBSOCKET_PATH: &str = "/ws";

/// Title used when a publisher does not provide one
pub const DEFAULT_STREAM_TITLE: &str = "Untitled Stream";

/// Display name used when a publisher or chat sender does not provide one
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// Prefix of generated stream identifiers
pub const STREAM_ID_PREFIX: &str = "stream";

/// Length of the random base-36 suffix of generated stream identifiers
pub const STREAM_ID_SUFFIX_LEN: usize = 9;
