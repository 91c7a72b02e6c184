//! Signaling server
//!
//! TCP accept loop, HTTP query surface, and the per-connection WebSocket
//! pump. The server owns the shared components (hub, registry, relay) and
//! wires every accepted connection to them.

pub mod config;
pub(crate) mod connection;
pub(crate) mod http;
pub mod listener;

pub use config::ServerConfig;
pub use listener::SignalingServer;
