//! Request correlation for the single in-flight Kodi request.
//!
//! Kodi's push notifications carry no reference to the request that caused
//! them, and every request uses the same id. The client therefore allows one
//! outstanding request at a time and interprets each inbound message by the
//! method it sent last:
//!
//! 1. after `Player.Open`, wait for `Player.OnPlay` (or `Player.OnStop` when
//!    a player id is already known),
//! 2. after `Player.Stop`, wait for `Player.OnStop`,
//! 3. otherwise accept the first reply with the shared id whose result fits
//!    the request.
//!
//! Anything else is not an error, just not the message being waited for.
//! [`interpret`] is the pure decision function; [`Correlator`] holds the state
//! it reads and applies its [`Outcome`].

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::connection::Phase;
use crate::event::Signal;
use crate::protocol::{ActivePlayer, InboundMessage, Method, PlayerId, ON_PLAY, ON_STOP};

/// Sender half of a caller's completion.
pub type Responder = oneshot::Sender<Signal>;

/// Receiver of a completion signal.
#[derive(Debug)]
pub enum Reply {
    /// A caller awaiting a [`Completion`](crate::Completion).
    Caller(Responder),
    /// Second half of stop-all: stop every listed player once the
    /// `Player.GetActivePlayers` reply is in, then answer the optional caller.
    StopAll(Option<Responder>),
}

impl Reply {
    fn deliver(self, signal: Signal) -> Option<Continuation> {
        match self {
            Self::Caller(tx) => {
                if tx.send(signal).is_err() {
                    trace!(%signal, "completion receiver dropped");
                }
                None
            }
            Self::StopAll(responder) => Some(Continuation { signal, responder }),
        }
    }
}

/// A stop-all sequence whose player listing has completed.
#[derive(Debug)]
pub struct Continuation {
    signal: Signal,
    responder: Option<Responder>,
}

impl Continuation {
    /// Returns the caller's responder if the listing succeeded.
    ///
    /// A failed listing ends the sequence here: it is logged and the caller
    /// hears nothing.
    pub fn resume(self) -> Option<Option<Responder>> {
        if self.signal.is_ok() {
            Some(self.responder)
        } else {
            warn!(signal = %self.signal, "listing active players failed, nothing stopped");
            None
        }
    }
}

/// One event of the underlying channel, as seen by the correlator.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(InboundMessage),
    Closed,
    Failed,
}

/// What a terminating message established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completed {
    /// `Player.OnPlay` after `Player.Open`.
    PlayerStarted(PlayerId),
    /// `Player.OnStop` after `Player.Open` while a player id was already known;
    /// Kodi stops the old item before starting the new one.
    PreviousPlayerStopped,
    /// `Player.OnStop` after `Player.Stop`.
    PlayerStopped,
    /// Reply to `Player.GetActivePlayers`.
    ActivePlayers(Vec<ActivePlayer>),
    /// `true` or `"OK"` reply to any other request.
    Acknowledged,
}

/// Result of interpreting one [`Inbound`] event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not the message the outstanding request waits for.
    Ignore,
    CompleteOk(Completed),
    CompleteError,
}

/// Decide what `inbound` means given the connection phase, the last method
/// sent and the currently known player.
///
/// Total and side-effect free.
pub fn interpret(
    phase: Phase,
    last_action: Option<Method>,
    current_player: Option<PlayerId>,
    inbound: &Inbound,
) -> Outcome {
    let msg = match inbound {
        Inbound::Closed | Inbound::Failed => return Outcome::CompleteError,
        Inbound::Message(msg) => msg,
    };
    if phase != Phase::Connected {
        return Outcome::Ignore;
    }

    match last_action {
        Some(Method::PlayerOpen) => {
            if msg.is_notification(ON_STOP) {
                return match current_player {
                    Some(_) => Outcome::CompleteOk(Completed::PreviousPlayerStopped),
                    None => Outcome::Ignore,
                };
            }
            if !msg.is_notification(ON_PLAY) {
                return Outcome::Ignore;
            }
            match msg.started_player_id() {
                Some(id) => Outcome::CompleteOk(Completed::PlayerStarted(id)),
                None => Outcome::Ignore,
            }
        }
        Some(Method::PlayerStop) => {
            if msg.is_notification(ON_STOP) {
                Outcome::CompleteOk(Completed::PlayerStopped)
            } else {
                Outcome::Ignore
            }
        }
        _ if !msg.is_reply() || msg.error.is_some() => Outcome::Ignore,
        Some(Method::GetActivePlayers) => match msg.active_players() {
            Ok(players) => Outcome::CompleteOk(Completed::ActivePlayers(players)),
            Err(_) => Outcome::Ignore,
        },
        _ if msg.is_acknowledgement() => Outcome::CompleteOk(Completed::Acknowledged),
        _ => Outcome::Ignore,
    }
}

/// State of the single outstanding request.
///
/// Holds the last sent method, the pending reply, the queue of replies
/// waiting only for the connection to open, and what the client has learned
/// about Kodi's players. Never holds both a pending reply and queued replies
/// that the same completion could reach twice: [`complete`](Self::complete)
/// serves the pending reply or drains the queue, not both.
#[derive(Debug, Default)]
pub struct Correlator {
    last_action: Option<Method>,
    pending: Option<Reply>,
    on_ready: VecDeque<Reply>,
    active_players: Vec<ActivePlayer>,
    player_id: Option<PlayerId>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_action(&self) -> Option<Method> {
        self.last_action
    }

    /// Player started by the most recent confirmed `Player.Open`.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    /// Result of the most recent `Player.GetActivePlayers`.
    pub fn active_players(&self) -> &[ActivePlayer] {
        &self.active_players
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn queued(&self) -> usize {
        self.on_ready.len()
    }

    /// Park `reply` until the connection opens.
    pub fn queue_on_ready(&mut self, reply: Reply) {
        self.on_ready.push_back(reply);
    }

    /// Record that `method` was sent. `reply` replaces any pending reply.
    pub fn begin(&mut self, method: Method, reply: Option<Reply>) {
        if self.pending.is_some() {
            debug!(%method, "replacing unanswered pending reply");
        }
        self.last_action = Some(method);
        self.pending = reply;
    }

    /// Interpret `inbound` and complete the outstanding request if it
    /// terminates it.
    pub fn handle(&mut self, phase: Phase, inbound: &Inbound) -> Vec<Continuation> {
        match interpret(phase, self.last_action, self.player_id, inbound) {
            Outcome::Ignore => {
                trace!(last_action = ?self.last_action, "ignoring message");
                Vec::new()
            }
            Outcome::CompleteOk(completed) => {
                self.apply(completed);
                self.complete(Signal::Ok)
            }
            Outcome::CompleteError => self.complete(Signal::Error),
        }
    }

    fn apply(&mut self, completed: Completed) {
        match completed {
            Completed::PlayerStarted(id) => {
                debug!(playerid = id, "player started");
                self.player_id = Some(id);
            }
            Completed::PlayerStopped => {
                debug!(playerid = ?self.player_id, "player stopped");
                self.player_id = None;
            }
            Completed::ActivePlayers(players) => {
                debug!(count = players.len(), "active players listed");
                self.active_players = players;
            }
            Completed::PreviousPlayerStopped | Completed::Acknowledged => {}
        }
    }

    /// Deliver `signal` to the pending reply, or, if none is pending, to every
    /// queued reply in FIFO order.
    pub fn complete(&mut self, signal: Signal) -> Vec<Continuation> {
        self.last_action = None;
        let replies: Vec<Reply> = match self.pending.take() {
            Some(reply) => vec![reply],
            None => self.on_ready.drain(..).collect(),
        };
        replies
            .into_iter()
            .filter_map(|reply| reply.deliver(signal))
            .collect()
    }

    /// Discard everything. Dropped responders resolve their completions
    /// with `None`.
    pub fn reset(&mut self) {
        *self = Self::default();
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
    use crate::protocol::PlayerKind;
    use serde_json::json;

    fn message(value: serde_json::Value) -> Inbound {
        Inbound::Message(serde_json::from_value(value).unwrap())
    }

    fn on_play(playerid: PlayerId) -> Inbound {
        message(json!({
            "jsonrpc": "2.0",
            "method": "Player.OnPlay",
            "params": {"data": {"player": {"playerid": playerid}}, "sender": "xbmc"}
        }))
    }

    fn on_stop() -> Inbound {
        message(json!({
            "jsonrpc": "2.0",
            "method": "Player.OnStop",
            "params": {"data": {"end": false}, "sender": "xbmc"}
        }))
    }

    fn reply(result: serde_json::Value) -> Inbound {
        message(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
    }

    fn caller() -> (Reply, oneshot::Receiver<Signal>) {
        let (tx, rx) = oneshot::channel();
        (Reply::Caller(tx), rx)
    }

    // ── interpret ───────────────────────────────────────────────────

    #[test]
    fn close_and_error_always_complete_with_error() {
        for phase in [Phase::Disconnected, Phase::Connecting, Phase::Connected] {
            for last in [None, Some(Method::PlayerOpen), Some(Method::PlayerStop)] {
                assert_eq!(
                    interpret(phase, last, None, &Inbound::Closed),
                    Outcome::CompleteError
                );
                assert_eq!(
                    interpret(phase, last, Some(1), &Inbound::Failed),
                    Outcome::CompleteError
                );
            }
        }
    }

    #[test]
    fn messages_before_connected_are_ignored() {
        assert_eq!(
            interpret(Phase::Connecting, None, None, &reply(json!("OK"))),
            Outcome::Ignore
        );
    }

    #[test]
    fn open_completes_on_play_with_player_id() {
        assert_eq!(
            interpret(Phase::Connected, Some(Method::PlayerOpen), None, &on_play(3)),
            Outcome::CompleteOk(Completed::PlayerStarted(3))
        );
    }

    #[test]
    fn open_ignores_stop_without_known_player() {
        assert_eq!(
            interpret(Phase::Connected, Some(Method::PlayerOpen), None, &on_stop()),
            Outcome::Ignore
        );
    }

    #[test]
    fn open_completes_on_stop_with_known_player() {
        assert_eq!(
            interpret(Phase::Connected, Some(Method::PlayerOpen), Some(1), &on_stop()),
            Outcome::CompleteOk(Completed::PreviousPlayerStopped)
        );
    }

    #[test]
    fn player_zero_is_a_known_player() {
        assert_eq!(
            interpret(Phase::Connected, Some(Method::PlayerOpen), Some(0), &on_stop()),
            Outcome::CompleteOk(Completed::PreviousPlayerStopped)
        );

        let mut correlator = Correlator::new();
        correlator.begin(Method::PlayerOpen, None);
        correlator.handle(Phase::Connected, &on_play(0));
        assert_eq!(correlator.player_id(), Some(0));
    }

    #[test]
    fn open_ignores_its_own_ok_reply() {
        assert_eq!(
            interpret(Phase::Connected, Some(Method::PlayerOpen), None, &reply(json!("OK"))),
            Outcome::Ignore
        );
    }

    #[test]
    fn open_ignores_on_play_without_player() {
        let inbound = message(json!({"method": "Player.OnPlay", "params": {"data": {}}}));
        assert_eq!(
            interpret(Phase::Connected, Some(Method::PlayerOpen), None, &inbound),
            Outcome::Ignore
        );
    }

    #[test]
    fn stop_waits_for_on_stop() {
        let last = Some(Method::PlayerStop);
        assert_eq!(
            interpret(Phase::Connected, last, Some(1), &reply(json!("OK"))),
            Outcome::Ignore
        );
        assert_eq!(
            interpret(Phase::Connected, last, Some(1), &on_play(1)),
            Outcome::Ignore
        );
        assert_eq!(
            interpret(Phase::Connected, last, Some(1), &on_stop()),
            Outcome::CompleteOk(Completed::PlayerStopped)
        );
    }

    #[test]
    fn active_players_reply_is_captured() {
        let inbound = reply(json!([{"playerid": 1, "type": "video"}]));
        assert_eq!(
            interpret(Phase::Connected, Some(Method::GetActivePlayers), None, &inbound),
            Outcome::CompleteOk(Completed::ActivePlayers(vec![ActivePlayer {
                playerid: 1,
                kind: PlayerKind::Video,
            }]))
        );
    }

    #[test]
    fn active_players_reply_with_unexpected_shape_is_ignored() {
        let inbound = reply(json!({"players": []}));
        assert_eq!(
            interpret(Phase::Connected, Some(Method::GetActivePlayers), None, &inbound),
            Outcome::Ignore
        );
    }

    #[test]
    fn generic_reply_needs_true_or_ok() {
        let last = Some(Method::ShowNotification);
        assert_eq!(
            interpret(Phase::Connected, last, None, &reply(json!("OK"))),
            Outcome::CompleteOk(Completed::Acknowledged)
        );
        assert_eq!(
            interpret(Phase::Connected, last, None, &reply(json!(true))),
            Outcome::CompleteOk(Completed::Acknowledged)
        );
        assert_eq!(
            interpret(Phase::Connected, last, None, &reply(json!("nope"))),
            Outcome::Ignore
        );
    }

    #[test]
    fn generic_reply_needs_shared_id() {
        let inbound = message(json!({"jsonrpc": "2.0", "id": 7, "result": "OK"}));
        assert_eq!(
            interpret(Phase::Connected, Some(Method::PlayerRotate), None, &inbound),
            Outcome::Ignore
        );
    }

    #[test]
    fn error_replies_are_ignored() {
        let inbound = message(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32602, "message": "Invalid params."}
        }));
        for last in [Some(Method::GetActivePlayers), Some(Method::PlayerRotate)] {
            assert_eq!(interpret(Phase::Connected, last, None, &inbound), Outcome::Ignore);
        }
    }

    #[test]
    fn push_notifications_do_not_complete_generic_requests() {
        assert_eq!(
            interpret(Phase::Connected, Some(Method::PlayerRotate), None, &on_stop()),
            Outcome::Ignore
        );
    }

    // ── Correlator ──────────────────────────────────────────────────

    #[test]
    fn complete_prefers_pending_reply() {
        let mut correlator = Correlator::new();
        let (queued, mut queued_rx) = caller();
        let (pending, mut pending_rx) = caller();
        correlator.queue_on_ready(queued);
        correlator.begin(Method::PlayerRotate, Some(pending));

        correlator.complete(Signal::Ok);

        assert_eq!(pending_rx.try_recv().unwrap(), Signal::Ok);
        assert!(queued_rx.try_recv().is_err());
        assert_eq!(correlator.queued(), 1);
        assert_eq!(correlator.last_action(), None);
    }

    #[test]
    fn complete_without_pending_drains_queue_in_order() {
        let mut correlator = Correlator::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = oneshot::channel();
            correlator.queue_on_ready(Reply::StopAll(Some(tx)));
            receivers.push(rx);
        }

        let continuations = correlator.complete(Signal::Ok);

        assert_eq!(continuations.len(), 3);
        assert_eq!(correlator.queued(), 0);
        for (k, (continuation, mut rx)) in continuations.into_iter().zip(receivers).enumerate() {
            let responder = continuation.resume().unwrap().unwrap();
            responder.send(Signal::Ok).unwrap();
            assert_eq!(rx.try_recv().unwrap(), Signal::Ok, "entry {k} out of order");
        }
    }

    #[test]
    fn completion_is_delivered_once() {
        let mut correlator = Correlator::new();
        let (pending, mut rx) = caller();
        correlator.begin(Method::PlayerRotate, Some(pending));

        correlator.complete(Signal::Ok);
        correlator.complete(Signal::Error);

        assert_eq!(rx.try_recv().unwrap(), Signal::Ok);
        assert!(!correlator.has_pending());
    }

    #[test]
    fn handle_applies_player_state() {
        let mut correlator = Correlator::new();
        let (pending, mut rx) = caller();
        correlator.begin(Method::PlayerOpen, Some(pending));
        correlator.handle(Phase::Connected, &on_stop());
        assert!(rx.try_recv().is_err());

        correlator.handle(Phase::Connected, &on_play(3));
        assert_eq!(rx.try_recv().unwrap(), Signal::Ok);
        assert_eq!(correlator.player_id(), Some(3));

        correlator.begin(Method::PlayerStop, None);
        correlator.handle(Phase::Connected, &on_stop());
        assert_eq!(correlator.player_id(), None);
    }

    #[test]
    fn stop_all_continuation_resumes_only_on_ok() {
        let mut correlator = Correlator::new();
        correlator.begin(Method::GetActivePlayers, Some(Reply::StopAll(None)));
        let continuations =
            correlator.handle(Phase::Connected, &reply(json!([{"playerid": 5}])));
        assert_eq!(continuations.len(), 1);
        assert!(continuations.into_iter().next().unwrap().resume().is_some());
        assert_eq!(correlator.active_players().len(), 1);

        correlator.begin(Method::GetActivePlayers, Some(Reply::StopAll(None)));
        let continuations = correlator.handle(Phase::Connected, &Inbound::Closed);
        assert!(continuations.into_iter().next().unwrap().resume().is_none());
    }

    #[test]
    fn reset_clears_everything_and_drops_responders() {
        let mut correlator = Correlator::new();
        correlator.begin(Method::GetActivePlayers, None);
        correlator.handle(Phase::Connected, &reply(json!([{"playerid": 1}])));
        correlator.begin(Method::PlayerOpen, None);
        correlator.handle(Phase::Connected, &on_play(2));
        let (queued, mut queued_rx) = caller();
        correlator.queue_on_ready(queued);
        correlator.begin(Method::PlayerRotate, None);

        correlator.reset();

        assert_eq!(correlator.last_action(), None);
        assert_eq!(correlator.player_id(), None);
        assert!(correlator.active_players().is_empty());
        assert_eq!(correlator.queued(), 0);
        assert!(matches!(
            queued_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }
}
