//! Signaling protocol
//!
//! Wire-level message definitions and protocol constants. The protocol is
//! JSON over WebSocket: one object per text frame, tagged by a `type` field.

pub mod constants;
pub mod message;

pub use message::{ClientMessage, ServerMessage};
