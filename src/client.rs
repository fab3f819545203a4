//! Async client for controlling Kodi players over one WebSocket connection.
//!
//! [`KodiClient`] is a thin handle that communicates with a background event
//! loop task via an unbounded MPSC channel. The event loop owns the session:
//! the one connection, the single outstanding request and what is known
//! about Kodi's players. Every action returns a [`Completion`] right away; the
//! signal arrives once the event loop has seen the message that ends the
//! request.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = MemoryStore::with_address("192.168.1.20");
//! let (client, mut events) = KodiClient::start(WebSocketConnector::new(), store, KodiConfig::new());
//!
//! // The first action opens the connection. A request issued before the
//! // socket is open is dropped, so wait for readiness first.
//! client.connect()?.await;
//! match client.open_media("http://host/stream.m3u8")?.await {
//!     Some(Signal::Ok) => { /* playing */ }
//!     _ => { /* connection failed or was reset */ }
//! }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::config::{AddressStore, KodiConfig};
use crate::connection::{ChannelEvent, Connection, Phase};
use crate::correlator::{Continuation, Correlator, Inbound, Reply, Responder};
use crate::error::{KodiError, Result};
use crate::event::{KodiEvent, Signal};
use crate::protocol::{ActivePlayer, InboundMessage, Method, Notification, PlayerId, Request};
use crate::transport::Connector;

// ── Actions ─────────────────────────────────────────────────────────

/// A player action the client can perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `Player.Open` for a file path or URL.
    OpenMedia(String),
    /// `Player.Stop`. Without an id the remembered player is stopped, or,
    /// if none is known, every active player.
    Stop(Option<PlayerId>),
    /// List the active players and stop each of them.
    StopAllActivePlayers,
    /// `Player.Rotate`.
    Rotate(PlayerId),
    /// `Player.GetActivePlayers`; the result is kept for [`Snapshot::active_players`].
    GetActivePlayers,
    /// `GUI.ShowNotification`.
    ShowNotification(Notification),
}

// ── Completion ──────────────────────────────────────────────────────

/// Future resolving to the [`Signal`] that completed an action.
///
/// Resolves to `None` if the request state was discarded without a signal,
/// e.g. by [`KodiClient::disconnect`] or a reconnect to a changed address.
/// There is no reply timeout: if Kodi never sends the awaited message, the
/// future never resolves.
#[derive(Debug)]
#[must_use = "completions do nothing unless awaited"]
pub struct Completion {
    rx: oneshot::Receiver<Signal>,
}

impl Future for Completion {
    type Output = Option<Signal>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| result.ok())
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

/// Point-in-time view of the session state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub phase: Phase,
    /// URL of the current connection, if any.
    pub url: Option<String>,
    /// Method of the outstanding request.
    pub last_action: Option<Method>,
    /// Player started by the last confirmed `Player.Open`.
    pub player_id: Option<PlayerId>,
    /// Result of the last `Player.GetActivePlayers`.
    pub active_players: Vec<ActivePlayer>,
    /// Completions waiting for the connection to open.
    pub queued: usize,
    /// Whether a completion waits for a specific reply.
    pub has_pending: bool,
}

// ── Commands ────────────────────────────────────────────────────────

enum Command {
    Connect(Option<Responder>),
    Disconnect,
    Action {
        action: Action,
        responder: Option<Responder>,
    },
    Snapshot(oneshot::Sender<Snapshot>),
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the Kodi JSON-RPC player API.
///
/// Created via [`KodiClient::start`], which spawns the background event loop
/// and returns this handle together with a lifecycle event receiver.
pub struct KodiClient {
    /// Sender half of the command channel to the event loop.
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// Cleared by the event loop when it exits.
    running: Arc<AtomicBool>,
    /// Handle to the background event loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the event loop to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl KodiClient {
    /// Start the event loop and return a handle plus lifecycle event receiver.
    ///
    /// No connection is made until the first action or [`connect`](Self::connect).
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        connector: impl Connector,
        store: impl AddressStore,
        config: KodiConfig,
    ) -> (Self, mpsc::Receiver<KodiEvent>) {
        Self::start_with(Arc::new(connector), Arc::new(store), config)
    }

    /// Like [`start`](Self::start), using the connector this build provides.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start_default(
        store: impl AddressStore,
        config: KodiConfig,
    ) -> (Self, mpsc::Receiver<KodiEvent>) {
        Self::start_with(crate::transport::default_connector(), Arc::new(store), config)
    }

    fn start_with(
        connector: Arc<dyn Connector>,
        store: Arc<dyn AddressStore>,
        config: KodiConfig,
    ) -> (Self, mpsc::Receiver<KodiEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<KodiEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let running = Arc::new(AtomicBool::new(true));
        let shutdown_timeout = config.shutdown_timeout;

        let session = Session {
            config,
            store,
            connector,
            event_tx,
            backlog: VecDeque::new(),
            connection: None,
            correlator: Correlator::new(),
        };
        let task = tokio::spawn(event_loop(
            session,
            cmd_rx,
            shutdown_rx,
            Arc::clone(&running),
        ));

        let client = Self {
            cmd_tx,
            running,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };
        (client, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Open the connection to the configured address.
    ///
    /// Resolves with [`Signal::Connected`] once the channel is open (at once
    /// if it already is), or [`Signal::Error`] if opening fails.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn connect(&self) -> Result<Completion> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Connect(Some(tx)))?;
        Ok(Completion { rx })
    }

    /// Close the connection and discard all request state. Outstanding
    /// completions resolve to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect)
    }

    /// Perform `action` and return its completion.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn perform(&self, action: Action) -> Result<Completion> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Action {
            action,
            responder: Some(tx),
        })?;
        Ok(Completion { rx })
    }

    /// Perform `action` without a completion.
    ///
    /// Unlike dropping the [`Completion`] of [`perform`](Self::perform), this
    /// leaves the pending-reply slot empty, so the reply that ends the request
    /// is delivered to completions queued for readiness instead.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn perform_detached(&self, action: Action) -> Result<()> {
        self.send(Command::Action {
            action,
            responder: None,
        })
    }

    /// Start playback of `url`. Resolves once Kodi reports the player started.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn open_media(&self, url: impl Into<String>) -> Result<Completion> {
        self.perform(Action::OpenMedia(url.into()))
    }

    /// Stop `player_id`, the remembered player, or every active player.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn stop(&self, player_id: Option<PlayerId>) -> Result<Completion> {
        self.perform(Action::Stop(player_id))
    }

    /// Stop every active player.
    ///
    /// If listing the players fails, the completion never resolves with a
    /// signal; it resolves to `None` once the session is reset.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn stop_all_active_players(&self) -> Result<Completion> {
        self.perform(Action::StopAllActivePlayers)
    }

    /// Rotate the picture shown by `player_id`.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn rotate(&self, player_id: PlayerId) -> Result<Completion> {
        self.perform(Action::Rotate(player_id))
    }

    /// Refresh the list of active players.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn get_active_players(&self) -> Result<Completion> {
        self.perform(Action::GetActivePlayers)
    }

    /// Show a popup notification in the Kodi GUI.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub fn show_notification(&self, notification: Notification) -> Result<Completion> {
        self.perform(Action::ShowNotification(notification))
    }

    /// Read the current session state.
    ///
    /// Commands are processed in order, so the snapshot reflects every
    /// command issued before it.
    ///
    /// # Errors
    ///
    /// Returns [`KodiError::NotRunning`] if the event loop has exited.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| KodiError::NotRunning)
    }

    /// Shut down the client, closing the connection and stopping the event loop.
    pub async fn shutdown(&mut self) {
        debug!("KodiClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Give the loop time to close the transport, then abort it so the
        // task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("event loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("event loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("event loop aborted: {join_err}");
                    }
                }
            }
        }

        self.running.store(false, Ordering::Release);
    }

    /// Returns `true` while the event loop accepts commands.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn send(&self, command: Command) -> Result<()> {
        if !self.is_running() {
            return Err(KodiError::NotRunning);
        }
        self.cmd_tx
            .send(command)
            .map_err(|_| KodiError::NotRunning)
    }
}

impl std::fmt::Debug for KodiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KodiClient")
            .field("running", &self.is_running())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for KodiClient {
    fn drop(&mut self) {
        // No executor context to drive a graceful close from `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Everything the event loop owns: one per client.
struct Session {
    config: KodiConfig,
    store: Arc<dyn AddressStore>,
    connector: Arc<dyn Connector>,
    event_tx: mpsc::Sender<KodiEvent>,
    /// Events that must reach the receiver but found the channel full.
    backlog: VecDeque<KodiEvent>,
    connection: Option<Connection>,
    correlator: Correlator,
}

impl Session {
    fn phase(&self) -> Phase {
        self.connection
            .as_ref()
            .map_or(Phase::Disconnected, Connection::phase)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase(),
            url: self.connection.as_ref().map(|c| c.url().to_string()),
            last_action: self.correlator.last_action(),
            player_id: self.correlator.player_id(),
            active_players: self.correlator.active_players().to_vec(),
            queued: self.correlator.queued(),
            has_pending: self.correlator.has_pending(),
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(responder) => self.connect(responder).await,
            Command::Disconnect => self.disconnect().await,
            Command::Action { action, responder } => self.perform(action, responder).await,
            Command::Snapshot(tx) => {
                let _ = tx.send(self.snapshot());
            }
        }
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => self.on_open(),
            ChannelEvent::Message(text) => self.on_message(&text).await,
            ChannelEvent::Closed => {
                debug!("connection closed by server");
                self.channel_down(Inbound::Closed, None).await;
            }
            ChannelEvent::Failed(e) => {
                error!("connection error: {e}");
                self.channel_down(Inbound::Failed, Some(e.to_string())).await;
            }
        }
    }

    // ── Connection state machine ────────────────────────────────────

    /// Open a connection to the configured address, replacing one to a
    /// different address. `responder` fires once the channel is open.
    async fn connect(&mut self, responder: Option<Responder>) {
        if !self.connector.is_supported() {
            error!("websocket is not supported by this build");
            self.emit_critical(KodiEvent::Unsupported);
            return;
        }

        let Some(url) = self.config.resolve_url(self.store.as_ref()) else {
            let reason = KodiError::MissingAddress(self.config.address_key.clone());
            warn!("{reason}");
            self.emit_critical(KodiEvent::Disconnected {
                reason: Some(reason.to_string()),
            });
            return;
        };

        let existing = self
            .connection
            .as_ref()
            .map(|conn| (conn.url() == url, conn.phase()));
        match existing {
            Some((true, phase)) => {
                match (phase, responder) {
                    (Phase::Connected, Some(tx)) => {
                        let _ = tx.send(Signal::Connected);
                    }
                    (_, Some(tx)) => self.correlator.queue_on_ready(Reply::Caller(tx)),
                    (_, None) => {}
                }
                return;
            }
            Some((false, _)) => {
                debug!(to = %url, "address changed, resetting connection");
                self.disconnect().await;
            }
            None => {}
        }

        if let Some(tx) = responder {
            self.correlator.queue_on_ready(Reply::Caller(tx));
        }
        debug!(url = %url, "connecting");
        self.connection = Some(Connection::open(&self.connector, url.clone()));
        self.emit(KodiEvent::Connecting { url });
    }

    /// Tear down the connection without delivering any signal.
    async fn disconnect(&mut self) {
        let Some(conn) = self.connection.take() else {
            return;
        };
        debug!(url = %conn.url(), "disconnecting");
        conn.close().await;
        self.correlator.reset();
        self.emit_critical(KodiEvent::Disconnected {
            reason: Some("disconnected by client".into()),
        });
    }

    /// Reconnect if there is no connection or the configured address changed.
    /// An address removed from the store leaves the open connection alone.
    async fn check_reconnect(&mut self) {
        let url = self.config.resolve_url(self.store.as_ref());
        let stale = match (url.as_deref(), self.connection.as_ref()) {
            (_, None) => true,
            (Some(url), Some(conn)) => conn.url() != url,
            (None, Some(_)) => false,
        };
        if stale {
            self.connect(None).await;
        }
    }

    fn on_open(&mut self) {
        let url = self
            .connection
            .as_ref()
            .map(|c| c.url().to_string())
            .unwrap_or_default();
        debug!(url = %url, "connected");
        self.emit(KodiEvent::Connected { url });
        let continuations = self.correlator.complete(Signal::Connected);
        settle(continuations);
    }

    /// Close or error: fail whatever waits, then reset everything.
    async fn channel_down(&mut self, inbound: Inbound, reason: Option<String>) {
        let phase = self.phase();
        let continuations = self.correlator.handle(phase, &inbound);
        self.correlator.reset();
        self.connection = None;
        settle(continuations);
        self.emit_critical(KodiEvent::Disconnected { reason });
    }

    // ── Lifecycle events ────────────────────────────────────────────

    /// Emit an event to the event channel. If the channel is full, log a
    /// warning and drop the event.
    fn emit(&mut self, event: KodiEvent) {
        if !self.backlog.is_empty() {
            warn!("event receiver is behind, dropping event: {event:?}");
            return;
        }
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("event channel full, dropping event: {dropped:?}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    /// Emit an event that must not be dropped. A full channel parks it in
    /// the backlog, which the event loop drains as the receiver catches up.
    fn emit_critical(&mut self, event: KodiEvent) {
        if !self.backlog.is_empty() {
            self.backlog.push_back(event);
            return;
        }
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(parked)) => {
                debug!("event channel full, parking event: {parked:?}");
                self.backlog.push_back(parked);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    /// Best-effort delivery of the backlog on exit.
    fn flush_backlog(&mut self) {
        while let Some(event) = self.backlog.pop_front() {
            if let Err(e) = self.event_tx.try_send(event) {
                debug!("event loop exiting, dropping undelivered event: {e}");
                self.backlog.clear();
            }
        }
    }

    // ── Request correlation ─────────────────────────────────────────

    async fn send_request(&mut self, request: Request, reply: Option<Reply>) {
        let method = request.method;
        let Some(conn) = self.connection.as_mut() else {
            debug!(%method, "no connection, request dropped");
            return;
        };
        if conn.phase() != Phase::Connected {
            debug!(%method, "connection not ready, request dropped");
            if let Some(reply) = reply {
                self.correlator.queue_on_ready(reply);
            }
            return;
        }

        let json = match request.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(%method, "{e}");
                return;
            }
        };
        self.correlator.begin(method, reply);
        debug!(%method, "sending request");
        if let Err(e) = conn.send(json).await {
            error!(%method, "transport send error: {e}");
            self.channel_down(Inbound::Failed, Some(e.to_string())).await;
        }
    }

    async fn on_message(&mut self, text: &str) {
        let msg = match InboundMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("failed to parse Kodi message: {e} (raw: {text})");
                return;
            }
        };
        if let Some(rpc_error) = &msg.error {
            warn!(
                code = %rpc_error.code,
                last_action = ?self.correlator.last_action(),
                "Kodi returned an error: {}",
                rpc_error.message
            );
        }

        let phase = self.phase();
        let continuations = self.correlator.handle(phase, &Inbound::Message(msg));
        for continuation in continuations {
            if let Some(responder) = continuation.resume() {
                self.stop_listed_players(responder).await;
            }
        }
    }

    // ── Player actions ──────────────────────────────────────────────

    async fn perform(&mut self, action: Action, responder: Option<Responder>) {
        self.check_reconnect().await;
        let caller = responder.map(Reply::Caller);
        match action {
            Action::OpenMedia(url) => self.send_request(Request::open(url), caller).await,
            Action::Stop(player_id) => self.stop(player_id, caller).await,
            Action::StopAllActivePlayers => self.stop_all(caller).await,
            Action::Rotate(player_id) => self.send_request(Request::rotate(player_id), caller).await,
            Action::GetActivePlayers => {
                self.send_request(Request::get_active_players(), caller).await;
            }
            Action::ShowNotification(notification) => {
                self.send_request(Request::show_notification(notification), caller)
                    .await;
            }
        }
    }

    async fn stop(&mut self, player_id: Option<PlayerId>, reply: Option<Reply>) {
        match player_id.or(self.correlator.player_id()) {
            Some(id) => self.send_request(Request::stop(id), reply).await,
            None => self.stop_all(reply).await,
        }
    }

    /// First half of stop-all: list the active players.
    async fn stop_all(&mut self, reply: Option<Reply>) {
        let responder = match reply {
            Some(Reply::Caller(tx)) => Some(tx),
            Some(Reply::StopAll(responder)) => responder,
            None => None,
        };
        self.send_request(Request::get_active_players(), Some(Reply::StopAll(responder)))
            .await;
    }

    /// Second half of stop-all: stop each listed player in order. Only the
    /// last stop carries the caller's responder.
    async fn stop_listed_players(&mut self, responder: Option<Responder>) {
        let players: Vec<PlayerId> = self
            .correlator
            .active_players()
            .iter()
            .map(|player| player.playerid)
            .collect();

        let Some((last, rest)) = players.split_last() else {
            debug!("no active players, nothing to stop");
            if let Some(tx) = responder {
                let _ = tx.send(Signal::Ok);
            }
            return;
        };

        for &id in rest {
            self.check_reconnect().await;
            self.send_request(Request::stop(id), None).await;
        }
        self.check_reconnect().await;
        self.send_request(Request::stop(*last), responder.map(Reply::Caller))
            .await;
    }
}

/// Resolve continuations that can only end the stop-all sequence.
fn settle(continuations: Vec<Continuation>) {
    for continuation in continuations {
        if continuation.resume().is_some() {
            warn!("stop-all continuation resumed outside a reply, dropped");
        }
    }
}

// ── Event loop ──────────────────────────────────────────────────────

/// Background loop that multiplexes commands and channel events via
/// `tokio::select!`.
///
/// Exits when the command channel closes (client handle dropped) or the
/// shutdown signal fires. Closing or losing the connection does not end the
/// loop; the next action reconnects.
async fn event_loop(
    mut session: Session,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut shutdown_rx: oneshot::Receiver<()>,
    running: Arc<AtomicBool>,
) {
    debug!("event loop started");

    loop {
        let event_tx = session.event_tx.clone();
        tokio::select! {
            // Branch 1: command from the client handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(command) => session.handle_command(command).await,
                    None => {
                        debug!("command channel closed, shutting down event loop");
                        session.disconnect().await;
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                session.disconnect().await;
                break;
            }

            // Branch 3: event from the current connection
            event = next_channel_event(&mut session.connection) => {
                session.handle_channel_event(event).await;
            }

            // Branch 4: room for a parked lifecycle event
            permit = backlog_permit(&event_tx, !session.backlog.is_empty()) => {
                match (permit, session.backlog.pop_front()) {
                    (Some(permit), Some(event)) => permit.send(event),
                    (None, _) => session.backlog.clear(),
                    (Some(_), None) => {}
                }
            }
        }
    }

    session.flush_backlog();

    running.store(false, Ordering::Release);
    debug!("event loop exited");
}

async fn next_channel_event(connection: &mut Option<Connection>) -> ChannelEvent {
    match connection {
        Some(conn) => conn.next_event().await,
        None => std::future::pending().await,
    }
}

/// Resolves with a send permit once the backlog has somewhere to go.
/// Never resolves while the backlog is empty.
async fn backlog_permit(
    event_tx: &mpsc::Sender<KodiEvent>,
    waiting: bool,
) -> Option<mpsc::Permit<'_, KodiEvent>> {
    if !waiting {
        return std::future::pending().await;
    }
    event_tx.reserve().await.ok()
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::config::MemoryStore;
    use crate::transport::{Transport, UnsupportedConnector};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// Answers each sent message with the next scripted reply.
    struct MockTransport {
        replies: VecDeque<Option<Result<String>>>,
        ready: VecDeque<Option<Result<String>>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            if let Some(reply) = self.replies.pop_front() {
                self.ready.push_back(reply);
            }
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            match self.ready.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct MockConnector {
        incoming: StdMutex<Vec<Option<Result<String>>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        connects: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
            self.connects.lock().unwrap().push(url.to_string());
            let incoming = std::mem::take(&mut *self.incoming.lock().unwrap());
            Ok(Box::new(MockTransport {
                replies: VecDeque::from(incoming),
                ready: VecDeque::new(),
                sent: Arc::clone(&self.sent),
            }))
        }
    }

    #[allow(clippy::type_complexity)]
    fn start(
        incoming: Vec<Option<Result<String>>>,
    ) -> (
        KodiClient,
        mpsc::Receiver<KodiEvent>,
        Arc<StdMutex<Vec<String>>>,
        Arc<StdMutex<Vec<String>>>,
    ) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let connects = Arc::new(StdMutex::new(Vec::new()));
        let connector = MockConnector {
            incoming: StdMutex::new(incoming),
            sent: Arc::clone(&sent),
            connects: Arc::clone(&connects),
        };
        let store = MemoryStore::with_address("kodi.lan");
        let (client, events) = KodiClient::start(connector, store, KodiConfig::new());
        (client, events, sent, connects)
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connect_emits_lifecycle_events() {
        let (mut client, mut events, _sent, connects) = start(vec![]);

        let signal = client.connect().unwrap().await;
        assert_eq!(signal, Some(Signal::Connected));
        assert_eq!(
            events.recv().await.unwrap(),
            KodiEvent::Connecting {
                url: "ws://kodi.lan:9090".into()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            KodiEvent::Connected {
                url: "ws://kodi.lan:9090".into()
            }
        );
        assert_eq!(*connects.lock().unwrap(), vec!["ws://kodi.lan:9090".to_string()]);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn show_notification_completes_on_ok_reply() {
        let (mut client, _events, sent, _connects) = start(vec![Some(Ok(
            r#"{"id":1,"jsonrpc":"2.0","result":"OK"}"#.into(),
        ))]);
        client.connect().unwrap().await;

        let signal = client
            .show_notification(Notification::new("Hyperion", "hello"))
            .unwrap()
            .await;
        assert_eq!(signal, Some(Signal::Ok));

        let messages = sent.lock().unwrap().clone();
        let request: serde_json::Value = serde_json::from_str(&messages[0]).unwrap();
        assert_eq!(request["method"], "GUI.ShowNotification");
        assert_eq!(request["params"]["displaytime"], 5000);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn unsupported_connector_reports_and_aborts() {
        let store = MemoryStore::with_address("kodi.lan");
        let (mut client, mut events) =
            KodiClient::start(UnsupportedConnector, store, KodiConfig::new());

        let completion = client.connect().unwrap();
        assert_eq!(events.recv().await.unwrap(), KodiEvent::Unsupported);
        assert_eq!(completion.await, None);
        assert_eq!(client.snapshot().await.unwrap().phase, Phase::Disconnected);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn missing_address_aborts_connect() {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let connects = Arc::new(StdMutex::new(Vec::new()));
        let connector = MockConnector {
            incoming: StdMutex::new(vec![]),
            sent,
            connects: Arc::clone(&connects),
        };
        let (mut client, mut events) =
            KodiClient::start(connector, MemoryStore::new(), KodiConfig::new());

        assert_eq!(client.connect().unwrap().await, None);
        assert!(matches!(
            events.recv().await.unwrap(),
            KodiEvent::Disconnected { reason: Some(reason) } if reason.contains("kodiAddress")
        ));
        assert!(connects.lock().unwrap().is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_running_after_shutdown() {
        let (mut client, _events, _sent, _connects) = start(vec![]);
        client.shutdown().await;

        assert!(!client.is_running());
        assert!(matches!(client.connect(), Err(KodiError::NotRunning)));
        assert!(matches!(client.snapshot().await, Err(KodiError::NotRunning)));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (mut client, _events, _sent, _connects) = start(vec![]);
        client.shutdown().await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (mut client, _events, _sent, _connects) = start(vec![]);
        let debug = format!("{client:?}");
        assert!(debug.contains("KodiClient"));
        assert!(debug.contains("running"));
        client.shutdown().await;
    }
}
