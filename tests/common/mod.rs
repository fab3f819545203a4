#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the Kodi client integration tests.
//!
//! [`MockConnector`] hands every channel it opens to the test as a
//! [`MockPeer`], which plays the Kodi side: it decides when the handshake
//! completes, pushes notifications and replies, and reads the requests the
//! client sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kodi_ws_client::config::MemoryStore;
use kodi_ws_client::{Connector, KodiClient, KodiConfig, KodiError, KodiEvent, Transport};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

/// How long a test waits for something that should happen.
pub const WAIT: Duration = Duration::from_secs(2);

/// How long a test waits before concluding that nothing happens.
pub const QUIET: Duration = Duration::from_millis(100);

type Incoming = Option<Result<String, KodiError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// Client side of a mock channel.
pub struct MockTransport {
    sent: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<Incoming>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), KodiError> {
        self.sent
            .send(message)
            .map_err(|_| KodiError::TransportSend("peer dropped".into()))
    }

    async fn recv(&mut self) -> Option<Result<String, KodiError>> {
        match self.incoming.recv().await {
            Some(item) => item,
            // A dropped peer is a silent peer, not a closed one.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), KodiError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockPeer ────────────────────────────────────────────────────────

/// Kodi side of a mock channel.
pub struct MockPeer {
    pub url: String,
    sent: mpsc::UnboundedReceiver<String>,
    incoming: mpsc::UnboundedSender<Incoming>,
    closed: Arc<AtomicBool>,
    open_tx: Option<oneshot::Sender<Result<(), KodiError>>>,
}

impl MockPeer {
    /// Complete the handshake.
    pub fn open(&mut self) {
        if let Some(tx) = self.open_tx.take() {
            tx.send(Ok(())).unwrap();
        }
    }

    /// Fail the handshake.
    pub fn refuse(&mut self) {
        if let Some(tx) = self.open_tx.take() {
            tx.send(Err(KodiError::TransportClosed)).unwrap();
        }
    }

    /// Push a text message to the client.
    pub fn push(&self, message: impl Into<String>) {
        self.incoming.send(Some(Ok(message.into()))).unwrap();
    }

    /// Close the channel from the Kodi side.
    pub fn hang_up(&self) {
        self.incoming.send(None).unwrap();
    }

    /// Report a channel error.
    pub fn fail(&self) {
        self.incoming
            .send(Some(Err(KodiError::TransportReceive("connection reset".into()))))
            .unwrap();
    }

    /// Whether the client closed this channel.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Next request the client sent, parsed.
    pub async fn next_request(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.sent.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("client side dropped");
        serde_json::from_str(&text).expect("request is valid JSON")
    }

    /// Assert that the client sends nothing for a while.
    pub async fn expect_no_request(&mut self) {
        if let Ok(Some(text)) = tokio::time::timeout(QUIET, self.sent.recv()).await {
            panic!("unexpected request: {text}");
        }
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Connector that hands each opened channel to the test.
pub struct MockConnector {
    peers: mpsc::UnboundedSender<MockPeer>,
    auto_open: bool,
}

impl MockConnector {
    /// With `auto_open` the handshake completes immediately; otherwise it
    /// waits for [`MockPeer::open`] and never completes if the peer is dropped.
    pub fn new(auto_open: bool) -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Self { peers, auto_open }, rx)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, KodiError> {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let transport = MockTransport {
            sent: sent_tx,
            incoming: incoming_rx,
            closed: Arc::clone(&closed),
        };

        let (open_tx, open_rx) = if self.auto_open {
            (None, None)
        } else {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        };

        let peer = MockPeer {
            url: url.to_string(),
            sent: sent_rx,
            incoming: incoming_tx,
            closed,
            open_tx,
        };
        self.peers
            .send(peer)
            .map_err(|_| KodiError::TransportClosed)?;

        if let Some(rx) = open_rx {
            match rx.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => std::future::pending::<()>().await,
            }
        }
        Ok(Box::new(transport))
    }
}

// ── Harness ─────────────────────────────────────────────────────────

/// A running client wired to a [`MockConnector`].
pub struct Harness {
    pub client: KodiClient,
    pub events: mpsc::Receiver<KodiEvent>,
    pub peers: mpsc::UnboundedReceiver<MockPeer>,
    pub store: MemoryStore,
}

impl Harness {
    /// Client whose store holds `kodi.lan`.
    pub fn start(auto_open: bool) -> Self {
        let (connector, peers) = MockConnector::new(auto_open);
        let store = MemoryStore::with_address("kodi.lan");
        let (client, events) = KodiClient::start(connector, store.clone(), KodiConfig::new());
        Self {
            client,
            events,
            peers,
            store,
        }
    }

    /// Next channel the client opened.
    pub async fn next_peer(&mut self) -> MockPeer {
        tokio::time::timeout(WAIT, self.peers.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// Assert that the client opens no further channel for a while.
    pub async fn expect_no_peer(&mut self) {
        if let Ok(Some(peer)) = tokio::time::timeout(QUIET, self.peers.recv()).await {
            panic!("unexpected connection to {}", peer.url);
        }
    }

    /// Next lifecycle event.
    pub async fn next_event(&mut self) -> KodiEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    /// Connect and return the open peer.
    pub async fn connected(&mut self) -> MockPeer {
        let completion = self.client.connect().unwrap();
        let mut peer = self.next_peer().await;
        peer.open();
        assert_eq!(
            tokio::time::timeout(WAIT, completion).await.unwrap(),
            Some(kodi_ws_client::Signal::Connected)
        );
        peer
    }
}

// ── JSON fixtures ───────────────────────────────────────────────────

/// `Player.OnPlay` notification for `playerid`.
pub fn on_play(playerid: i64) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "Player.OnPlay",
        "params": {
            "data": {
                "item": {"title": "", "type": "movie"},
                "player": {"playerid": playerid, "speed": 1}
            },
            "sender": "xbmc"
        }
    })
    .to_string()
}

/// `Player.OnStop` notification.
pub fn on_stop() -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "Player.OnStop",
        "params": {"data": {"end": false, "item": {"type": "movie"}}, "sender": "xbmc"}
    })
    .to_string()
}

/// `"OK"` reply with the shared request id.
pub fn ok_reply() -> String {
    json!({"jsonrpc": "2.0", "id": 1, "result": "OK"}).to_string()
}

/// `Player.GetActivePlayers` reply listing `ids` as video players.
pub fn active_players_reply(ids: &[i64]) -> String {
    let players: Vec<Value> = ids
        .iter()
        .map(|id| json!({"playerid": id, "playertype": "internal", "type": "video"}))
        .collect();
    json!({"jsonrpc": "2.0", "id": 1, "result": players}).to_string()
}

/// JSON-RPC error reply with the shared request id.
pub fn error_reply(code: i64, message: &str) -> String {
    json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": message}}).to_string()
}

/// Await `completion`, failing the test if it does not resolve in time.
pub async fn resolve(
    completion: kodi_ws_client::Completion,
) -> Option<kodi_ws_client::Signal> {
    tokio::time::timeout(WAIT, completion)
        .await
        .expect("completion did not resolve")
}
