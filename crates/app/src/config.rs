//! Connection and discovery settings.

use std::time::Duration;

use serde::Deserialize;

use crate::discovery::DiscoverOptions;

/// Shortest discovery window accepted.
pub const MIN_DISCOVERY_MS: u64 = 1000;

/// Tuning of one device connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// How long `write()` waits for the matching response, in seconds.
    pub response_timeout_secs: u64,
    /// Connect attempts before giving up.
    pub connect_attempts: u32,
    /// Pause between two connect attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Largest re-assembled packet accepted, in bytes.
    pub max_packet_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            response_timeout_secs: 30,
            connect_attempts: 3,
            retry_delay_ms: 1000,
            max_packet_len: linking_protocol::reassembler::DEFAULT_MAX_PACKET_LEN,
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Settings of the discovery manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Length of one `discover()` call, in milliseconds.
    pub duration_ms: u64,
    /// The scan is restarted this often while discovering, in milliseconds.
    pub rescan_interval_ms: u64,
    /// Only keep devices whose local name starts with this prefix.
    pub name_filter: Option<String>,
    /// Only keep devices whose identifier starts with this prefix.
    pub id_filter: Option<String>,
    /// Stop at the first matching device.
    pub quick: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            duration_ms: 5000,
            rescan_interval_ms: 3000,
            name_filter: None,
            id_filter: None,
            quick: false,
        }
    }
}

impl DiscoveryConfig {
    #[must_use]
    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms)
    }

    /// Options of a `discover()` call built from these settings.
    ///
    /// Durations under one second are raised to one second.
    #[must_use]
    pub fn options(&self) -> DiscoverOptions {
        DiscoverOptions {
            duration: Duration::from_millis(self.duration_ms.max(MIN_DISCOVERY_MS)),
            name_filter: self.name_filter.clone(),
            id_filter: self.id_filter.clone(),
            quick: self.quick,
        }
    }
}
