//! Presence core timing configuration.

use serde::{Deserialize, Serialize};

/// Timings and paths used by the presence core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Key-path root holding one presence record per user.
    pub status_root: String,
    /// Heartbeat period (valid range: 5-300).
    pub heartbeat_interval_secs: u32,
    /// Debounce window for network loss (valid range: 0-30000).
    pub network_debounce_ms: u32,
    /// Debounce window for channel loss (valid range: 0-30000).
    pub channel_debounce_ms: u32,
    /// Bulk refresh period of the online-users cache (valid range: 5-600).
    pub directory_refresh_secs: u32,
    /// Timeout for forced reachability and channel probes (valid range: 1-60).
    pub probe_timeout_secs: u32,
    /// Channel probes attempted by a forced recheck (valid range: 1-10).
    pub channel_probe_attempts: u32,
    /// Wait between channel probe attempts (valid range: 0-10000).
    pub channel_probe_wait_ms: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            status_root: "status".into(),
            heartbeat_interval_secs: 15,
            network_debounce_ms: 2000,
            channel_debounce_ms: 3000,
            directory_refresh_secs: 30,
            probe_timeout_secs: 5,
            channel_probe_attempts: 2,
            channel_probe_wait_ms: 500,
        }
    }
}
