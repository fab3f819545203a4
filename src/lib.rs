//! # Kodi WebSocket Client
//!
//! Async Rust client for controlling Kodi media players over Kodi's JSON-RPC
//! WebSocket interface.
//!
//! The client keeps one connection to the Kodi host whose address is read from
//! an [`AddressStore`](config::AddressStore), allows one outstanding request at
//! a time and completes every action with a [`Signal`] once Kodi has sent the
//! message that ends it: `Player.OnPlay` for an open, `Player.OnStop` for a
//! stop, a matching reply for everything else.
//!
//! ## Features
//!
//! - **Player control**: open media, stop one or all players, rotate, list
//!   active players, show GUI notifications
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend
//! - **WebSocket built-in**: the default `transport-websocket` feature provides
//!   [`WebSocketConnector`]
//! - **Event-driven**: connection lifecycle arrives as [`KodiEvent`]s on a channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kodi_ws_client::config::MemoryStore;
//! use kodi_ws_client::{KodiClient, KodiConfig, Signal};
//!
//! # async fn example() -> Result<(), kodi_ws_client::KodiError> {
//! let store = MemoryStore::with_address("192.168.1.20");
//! let (mut client, _events) = KodiClient::start_default(store, KodiConfig::new());
//!
//! if client.connect()?.await == Some(Signal::Connected) {
//!     let started = client.open_media("http://192.168.1.10:8090/stream.m3u8")?.await;
//!     println!("open: {started:?}");
//! }
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod error;
pub mod error_codes;
pub mod event;
pub mod protocol;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{Action, Completion, KodiClient, Snapshot};
pub use config::KodiConfig;
pub use connection::Phase;
pub use error::KodiError;
pub use error_codes::ErrorCode;
pub use event::{KodiEvent, Signal};
pub use protocol::{ActivePlayer, Method, Notification, NotificationImage, PlayerId, PlayerKind};
pub use transport::{Connector, Transport, UnsupportedConnector};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
