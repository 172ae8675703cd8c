//! btleplug adapter configuration.

use std::time::Duration;

use serde::Deserialize;

/// Which radio to use and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BtleplugConfig {
    /// Substring of the adapter description to pick (e.g. `"hci1"`).
    ///
    /// When unset, the first adapter is used.
    pub adapter: Option<String>,
    /// How long `wait_powered_on` waits for the radio, in seconds.
    pub power_on_timeout_secs: u64,
}

impl Default for BtleplugConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            power_on_timeout_secs: 5,
        }
    }
}

impl BtleplugConfig {
    #[must_use]
    pub fn power_on_timeout(&self) -> Duration {
        Duration::from_secs(self.power_on_timeout_secs)
    }
}
