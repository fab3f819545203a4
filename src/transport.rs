//! Transport abstraction for the Kodi JSON-RPC client.
//!
//! The [`Transport`] trait defines a bidirectional text message channel between
//! the client and Kodi. The [`Connector`] trait opens one such channel for a
//! URL. The client owns at most one transport at a time and asks its connector
//! for a new one whenever the configured address changes.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use kodi_ws_client::error::KodiError;
//! use kodi_ws_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), KodiError> {
//!         // Send the JSON text message over your transport
//!         Err(KodiError::TransportClosed)
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, KodiError>> {
//!         // Return None when the connection is closed cleanly
//!         None
//!     }
//!
//!     async fn close(&mut self) -> Result<(), KodiError> {
//!         Ok(())
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, KodiError> {
//!         Ok(Box::new(MyTransport {}))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::KodiError;

/// A bidirectional text message transport to a Kodi JSON-RPC endpoint.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to Kodi.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), KodiError>;

    /// Receive the next JSON text message.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed cleanly by the server
    async fn recv(&mut self) -> Option<Result<String, KodiError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), KodiError>;
}

/// Opens [`Transport`]s for connection URLs.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Whether this build can open duplex channels at all.
    ///
    /// When `false` the client reports [`KodiEvent::Unsupported`](crate::KodiEvent::Unsupported)
    /// and never calls [`connect`](Connector::connect).
    fn is_supported(&self) -> bool {
        true
    }

    /// Establish a channel to `url`.
    ///
    /// The returned future is polled by the client while the connection is in
    /// the connecting phase; dropping it aborts the attempt.
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, KodiError>;
}

/// Connector for builds without a WebSocket implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedConnector;

#[async_trait]
impl Connector for UnsupportedConnector {
    fn is_supported(&self) -> bool {
        false
    }

    async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>, KodiError> {
        Err(KodiError::Unsupported)
    }
}

/// The connector this build provides: [`WebSocketConnector`](crate::WebSocketConnector)
/// with the `transport-websocket` feature, [`UnsupportedConnector`] without it.
pub fn default_connector() -> Arc<dyn Connector> {
    #[cfg(feature = "transport-websocket")]
    {
        Arc::new(crate::transports::WebSocketConnector::new())
    }
    #[cfg(not(feature = "transport-websocket"))]
    {
        Arc::new(UnsupportedConnector)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_connector_refuses() {
        let connector = UnsupportedConnector;
        assert!(!connector.is_supported());
        let err = connector.connect("ws://localhost:9090").await.err().unwrap();
        assert!(matches!(err, KodiError::Unsupported));
    }

    #[test]
    fn connectors_are_object_safe() {
        let connector: Arc<dyn Connector> = Arc::new(UnsupportedConnector);
        assert!(!connector.is_supported());
    }

    #[cfg(feature = "transport-websocket")]
    #[test]
    fn default_connector_supports_websocket() {
        assert!(default_connector().is_supported());
    }
}
