//! Client configuration and the address store it reads from.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Store key the Kodi address is read from.
pub const ADDRESS_KEY: &str = "kodiAddress";

/// Port appended to addresses that do not carry one.
pub const DEFAULT_TCP_PORT: u16 = 9090;

/// Scheme prefix of every connection URL.
pub const WS_SCHEME: &str = "ws://";

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Read access to the key-value store that holds the Kodi address.
///
/// The client reads the address on every action, so a changed value takes
/// effect on the next call without an explicit reconnect.
pub trait AddressStore: Send + Sync + 'static {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory [`AddressStore`]. Clones share the same entries.
///
/// ```
/// use kodi_ws_client::config::{AddressStore, MemoryStore, ADDRESS_KEY};
///
/// let store = MemoryStore::new();
/// store.set(ADDRESS_KEY, "192.168.1.20");
/// assert_eq!(store.get(ADDRESS_KEY).as_deref(), Some("192.168.1.20"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a Kodi address under [`ADDRESS_KEY`].
    pub fn with_address(address: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(ADDRESS_KEY, address);
        store
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

impl AddressStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }
}

/// Build the WebSocket URL for a `host` or `host:port` address.
///
/// ```
/// use kodi_ws_client::config::connection_url;
///
/// assert_eq!(connection_url("10.0.0.5", 9090), "ws://10.0.0.5:9090");
/// assert_eq!(connection_url("10.0.0.5:8080", 9090), "ws://10.0.0.5:8080");
/// ```
pub fn connection_url(address: &str, default_port: u16) -> String {
    if address.contains(':') {
        format!("{WS_SCHEME}{address}")
    } else {
        format!("{WS_SCHEME}{address}:{default_port}")
    }
}

/// Configuration for a [`KodiClient`](crate::KodiClient).
///
/// # Example
///
/// ```
/// use kodi_ws_client::KodiConfig;
/// use std::time::Duration;
///
/// let config = KodiConfig::new()
///     .with_default_port(8080)
///     .with_shutdown_timeout(Duration::from_secs(3));
/// assert_eq!(config.address_key, "kodiAddress");
/// assert_eq!(config.default_port, 8080);
/// ```
#[derive(Debug, Clone)]
pub struct KodiConfig {
    /// Key the address is read from in the [`AddressStore`].
    pub address_key: String,
    /// Port used when the stored address has none. Defaults to **9090**.
    pub default_port: u16,
    /// Capacity of the bounded lifecycle event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the event loop gets to close the transport on
    /// [`KodiClient::shutdown`](crate::KodiClient::shutdown) before it is
    /// aborted. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl KodiConfig {
    pub fn new() -> Self {
        Self {
            address_key: ADDRESS_KEY.to_string(),
            default_port: DEFAULT_TCP_PORT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_address_key(mut self, key: impl Into<String>) -> Self {
        self.address_key = key.into();
        self
    }

    #[must_use]
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// Set the capacity of the lifecycle event channel. Values below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Resolve the connection URL from `store`, or `None` if no address is set.
    pub fn resolve_url(&self, store: &dyn AddressStore) -> Option<String> {
        store
            .get(&self.address_key)
            .map(|address| connection_url(&address, self.default_port))
    }
}

impl Default for KodiConfig {
    fn default() -> Self {
        Self::new()
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

    #[test]
    fn bare_hosts_get_the_default_port() {
        for host in ["localhost", "192.168.0.10", "kodi.lan", ""] {
            assert_eq!(
                connection_url(host, DEFAULT_TCP_PORT),
                format!("ws://{host}:9090")
            );
        }
    }

    #[test]
    fn addresses_with_a_colon_are_used_verbatim() {
        for address in ["localhost:1234", "192.168.0.10:9090", "[::1]"] {
            assert_eq!(
                connection_url(address, DEFAULT_TCP_PORT),
                format!("ws://{address}")
            );
        }
    }

    #[test]
    fn config_defaults() {
        let config = KodiConfig::default();
        assert_eq!(config.address_key, ADDRESS_KEY);
        assert_eq!(config.default_port, 9090);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn event_channel_capacity_is_clamped_to_one() {
        let config = KodiConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn resolve_url_reads_configured_key() {
        let store = MemoryStore::new();
        let config = KodiConfig::new()
            .with_address_key("customKey")
            .with_default_port(8080);
        assert_eq!(config.resolve_url(&store), None);

        store.set("customKey", "kodi.lan");
        assert_eq!(
            config.resolve_url(&store).as_deref(),
            Some("ws://kodi.lan:8080")
        );

        store.remove("customKey");
        assert_eq!(config.resolve_url(&store), None);
    }

    #[test]
    fn memory_store_clones_share_entries() {
        let store = MemoryStore::with_address("a");
        let clone = store.clone();
        clone.set(ADDRESS_KEY, "b");
        assert_eq!(store.get(ADDRESS_KEY).as_deref(), Some("b"));
    }
}
