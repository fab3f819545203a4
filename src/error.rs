//! Error types for the Kodi WebSocket client.

use thiserror::Error;

/// Errors that can occur when using the Kodi client.
#[derive(Debug, Error)]
pub enum KodiError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a JSON-RPC message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The host build has no duplex channel implementation available.
    #[error("websocket is not supported in this build")]
    Unsupported,

    /// No Kodi address is configured under the given store key.
    #[error("no address configured under key `{0}`")]
    MissingAddress(String),

    /// The client event loop has exited; no further commands are accepted.
    #[error("client is not running")]
    NotRunning,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Kodi client operations.
pub type Result<T> = std::result::Result<T, KodiError>;
