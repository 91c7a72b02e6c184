//! # signal-rs
//!
//! WebRTC broadcast signaling relay server library.
//!
//! One broadcaster publishes a live session; any number of viewers discover
//! it and negotiate a direct peer connection through the relay. The relay
//! never touches media: it tracks which streams exist, who broadcasts each
//! one, who is watching, and routes session descriptions and connectivity
//! candidates between exactly the right connections.
//!
//! ## Components
//!
//! - [`registry::StreamRegistry`] — stream records, rooms, and broadcaster
//!   assignments, with serialized-per-stream mutations
//! - [`relay::SignalingRelay`] — stateless routing of offers, answers,
//!   candidates, and chat
//! - [`hub::ConnectionHub`] — connection identities and fire-and-forget
//!   outbound delivery
//! - [`server::SignalingServer`] — TCP accept loop serving the HTTP query
//!   surface and WebSocket signaling endpoints
//!
//! ## Example
//!
//! ```no_run
//! use signal_rs::{ServerConfig, SignalingServer};
//!
//! #[tokio::main]
//! async fn main() -> signal_rs::Result<()> {
//!     let config = ServerConfig::default();
//!     let server = SignalingServer::new(config);
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use hub::{ConnectionHub, ConnectionId};
pub use registry::{PublishRequest, RegistryConfig, StreamId, StreamRegistry, StreamSnapshot};
pub use relay::SignalingRelay;
pub use server::{ServerConfig, SignalingServer};
