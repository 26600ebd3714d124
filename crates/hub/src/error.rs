use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when delivering events.
#[derive(Debug, Error)]
pub enum HubError {
    /// The transport is closed or its peer went away.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Writing to the transport failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport did not accept a write in time.
    #[error("Write timed out after {0:?}")]
    Timeout(Duration),

    /// An event payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
