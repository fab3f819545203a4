//! # Play URL Example
//!
//! Drives a Kodi host through a short session:
//!
//! 1. Connect to Kodi's JSON-RPC WebSocket port
//! 2. Show a notification in the Kodi GUI
//! 3. Start playback of a URL and wait for the player to start
//! 4. Log lifecycle events until Ctrl+C, then stop playback and shut down
//!
//! ## Running
//!
//! ```sh
//! # Enable "Allow remote control from applications on other systems" in Kodi, then:
//! KODI_ADDRESS=192.168.1.20 cargo run --example play_url -- http://host/stream.m3u8
//!
//! # A non-default JSON-RPC port goes into the address:
//! KODI_ADDRESS=192.168.1.20:9999 cargo run --example play_url -- http://host/a.mp4
//! ```

use std::time::Duration;

use kodi_ws_client::config::{MemoryStore, ADDRESS_KEY};
use kodi_ws_client::{
    KodiClient, KodiConfig, KodiEvent, Notification, NotificationImage, Signal,
    WebSocketConnector,
};

/// Kodi address when `KODI_ADDRESS` is not set.
const DEFAULT_ADDRESS: &str = "localhost";

/// Media played when no URL is given on the command line.
const DEFAULT_MEDIA: &str =
    "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=kodi_ws_client=debug` to follow the correlator.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let store = MemoryStore::new();
    let address = std::env::var("KODI_ADDRESS").unwrap_or_else(|_| DEFAULT_ADDRESS.to_string());
    store.set(ADDRESS_KEY, address);
    let media = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_MEDIA.to_string());

    let connector = WebSocketConnector::new().with_timeout(Duration::from_secs(5));
    let (mut client, mut event_rx) = KodiClient::start(connector, store, KodiConfig::new());

    // ── Session ─────────────────────────────────────────────────────
    if client.connect()?.await != Some(Signal::Connected) {
        tracing::error!("could not connect to Kodi");
        client.shutdown().await;
        return Ok(());
    }

    let note = Notification::new("kodi-ws-client", format!("Playing {media}"))
        .with_image(NotificationImage::Info)
        .with_display_time_ms(3000);
    tracing::info!("notification: {:?}", client.show_notification(note)?.await);

    match client.open_media(media.as_str())?.await {
        Some(Signal::Ok) => {
            let snapshot = client.snapshot().await?;
            tracing::info!("playing on player {:?}", snapshot.player_id);
        }
        other => tracing::warn!("open did not complete: {other:?}"),
    }

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("event channel closed, exiting");
                    break;
                };
                match event {
                    KodiEvent::Disconnected { reason } => {
                        tracing::warn!("disconnected: {}", reason.as_deref().unwrap_or("closed by Kodi"));
                        break;
                    }
                    KodiEvent::Unsupported => {
                        tracing::error!("this build has no WebSocket support");
                        break;
                    }
                    other => tracing::debug!("event: {other:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, stopping playback");
                tracing::info!("stop: {:?}", client.stop(None)?.await);
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("client shut down");
    Ok(())
}
