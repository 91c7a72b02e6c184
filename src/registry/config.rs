//! Registry configuration

use crate::protocol::constants::{DEFAULT_DISPLAY_NAME, DEFAULT_STREAM_TITLE};

/// Configuration for the stream registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Title given to streams published without one
    pub default_title: String,

    /// Display name given to publishers and chat senders without one
    pub default_display_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_title: DEFAULT_STREAM_TITLE.to_owned(),
            default_display_name: DEFAULT_DISPLAY_NAME.to_owned(),
        }
    }
}

impl RegistryConfig {
    /// Set the placeholder stream title
    pub fn default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    /// Set the placeholder display name
    pub fn default_display_name(mut self, name: impl Into<String>) -> Self {
        self.default_display_name = name.into();
        self
    }
}
