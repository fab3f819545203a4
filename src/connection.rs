//! The single live channel to Kodi and its phase.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::error::{KodiError, Result};
use crate::transport::{Connector, Transport};

/// Phase of the client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Box<dyn Transport>>> + Send>>;

enum Link {
    Opening(ConnectFuture),
    Open(Box<dyn Transport>),
}

/// Event produced by the channel.
#[derive(Debug)]
pub(crate) enum ChannelEvent {
    Opened,
    Message(String),
    Closed,
    Failed(KodiError),
}

/// Exclusive owner of one channel to `url`, opening or open.
pub(crate) struct Connection {
    url: String,
    link: Link,
}

impl Connection {
    /// Start opening a channel to `url`. Nothing happens until
    /// [`next_event`](Self::next_event) is polled.
    pub(crate) fn open(connector: &Arc<dyn Connector>, url: String) -> Self {
        let connector = Arc::clone(connector);
        let target = url.clone();
        let handshake: ConnectFuture = Box::pin(async move { connector.connect(&target).await });
        Self {
            url,
            link: Link::Opening(handshake),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn phase(&self) -> Phase {
        match self.link {
            Link::Opening(_) => Phase::Connecting,
            Link::Open(_) => Phase::Connected,
        }
    }

    /// Wait for the next channel event. Cancel-safe.
    pub(crate) async fn next_event(&mut self) -> ChannelEvent {
        match &mut self.link {
            Link::Opening(handshake) => match handshake.as_mut().await {
                Ok(transport) => {
                    self.link = Link::Open(transport);
                    ChannelEvent::Opened
                }
                Err(e) => ChannelEvent::Failed(e),
            },
            Link::Open(transport) => match transport.recv().await {
                Some(Ok(text)) => ChannelEvent::Message(text),
                Some(Err(e)) => ChannelEvent::Failed(e),
                None => ChannelEvent::Closed,
            },
        }
    }

    /// Send `text` if the channel is open; a no-op while still opening.
    pub(crate) async fn send(&mut self, text: String) -> Result<()> {
        match &mut self.link {
            Link::Open(transport) => transport.send(text).await,
            Link::Opening(_) => Ok(()),
        }
    }

    /// Close the channel. Once detached from the event loop it produces no
    /// further events.
    pub(crate) async fn close(self) {
        match self.link {
            Link::Open(mut transport) => {
                if let Err(e) = transport.close().await {
                    debug!(url = %self.url, "error closing transport: {e}");
                }
            }
            Link::Opening(_) => debug!(url = %self.url, "abandoning pending handshake"),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("phase", &self.phase())
            .finish()
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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    struct ScriptedTransport {
        incoming: VecDeque<Option<Result<String>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, message: String) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    struct ScriptedConnector {
        incoming: StdMutex<Option<Vec<Option<Result<String>>>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>> {
            let incoming = self
                .incoming
                .lock()
                .unwrap()
                .take()
                .ok_or(KodiError::TransportClosed)?;
            Ok(Box::new(ScriptedTransport {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&self.sent),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn connector(
        incoming: Vec<Option<Result<String>>>,
    ) -> (Arc<dyn Connector>, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let connector = ScriptedConnector {
            incoming: StdMutex::new(Some(incoming)),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (Arc::new(connector), sent, closed)
    }

    #[tokio::test]
    async fn opens_then_relays_messages_and_close() {
        let (connector, _sent, _closed) = connector(vec![Some(Ok("hello".into())), None]);
        let mut conn = Connection::open(&connector, "ws://kodi:9090".into());
        assert_eq!(conn.phase(), Phase::Connecting);
        assert_eq!(conn.url(), "ws://kodi:9090");

        assert!(matches!(conn.next_event().await, ChannelEvent::Opened));
        assert_eq!(conn.phase(), Phase::Connected);
        assert!(matches!(conn.next_event().await, ChannelEvent::Message(m) if m == "hello"));
        assert!(matches!(conn.next_event().await, ChannelEvent::Closed));
    }

    #[tokio::test]
    async fn send_while_opening_is_a_no_op() {
        let (connector, sent, _closed) = connector(vec![]);
        let mut conn = Connection::open(&connector, "ws://kodi:9090".into());
        conn.send("early".into()).await.unwrap();
        assert!(sent.lock().unwrap().is_empty());

        assert!(matches!(conn.next_event().await, ChannelEvent::Opened));
        conn.send("late".into()).await.unwrap();
        assert_eq!(*sent.lock().unwrap(), vec!["late".to_string()]);
    }

    #[tokio::test]
    async fn handshake_failure_is_reported() {
        let (connector, _sent, _closed) = connector(vec![]);
        let mut first = Connection::open(&connector, "ws://kodi:9090".into());
        assert!(matches!(first.next_event().await, ChannelEvent::Opened));

        // The scripted connector only hands out one transport.
        let mut second = Connection::open(&connector, "ws://kodi:9090".into());
        assert!(matches!(
            second.next_event().await,
            ChannelEvent::Failed(KodiError::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn close_closes_open_transport() {
        let (connector, _sent, closed) = connector(vec![]);
        let mut conn = Connection::open(&connector, "ws://kodi:9090".into());
        assert!(matches!(conn.next_event().await, ChannelEvent::Opened));
        conn.close().await;
        assert!(closed.load(Ordering::Relaxed));
    }
}
