//! Crate-level error types

use thiserror::Error;

/// Top-level error for server entry points
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure (bind, accept, socket options)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP protocol failure
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// WebSocket protocol failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] hyper_tungstenite::tungstenite::Error),

    /// JSON encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, Error>;
