//! Caller-facing completion signals and connection lifecycle events.

use std::fmt;

/// Outcome delivered to a caller's completion.
///
/// Every action resolves with [`Signal::Ok`] or [`Signal::Error`]. A completion
/// that was parked while the connection was still opening resolves with
/// [`Signal::Connected`] instead of the reply to its request, because that
/// request was never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Ok,
    Error,
    Connected,
}

impl Signal {
    /// Returns the lowercase name of the signal.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Connected => "connected",
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection lifecycle events emitted by [`KodiClient`](crate::KodiClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KodiEvent {
    /// A WebSocket handshake to `url` has started.
    Connecting { url: String },
    /// The connection to `url` is open and requests can be sent.
    Connected { url: String },
    /// The connection closed or failed. `reason` is `None` for a clean
    /// close by the server.
    Disconnected { reason: Option<String> },
    /// The build has no WebSocket support; the connect attempt was aborted.
    Unsupported,
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

    #[test]
    fn signal_literals() {
        assert_eq!(Signal::Ok.to_string(), "ok");
        assert_eq!(Signal::Error.to_string(), "error");
        assert_eq!(Signal::Connected.to_string(), "connected");
        assert!(Signal::Ok.is_ok());
        assert!(!Signal::Connected.is_ok());
    }
}
