//! Runtime settings for the presence core.

use std::time::Duration;

use crate::protocol::STATUS_ROOT;

/// Timings and paths for one presence session.
#[derive(Debug, Clone)]
pub struct PresenceSettings {
    pub status_root: String,
    pub heartbeat_interval: Duration,
    pub network_debounce: Duration,
    pub channel_debounce: Duration,
    pub directory_refresh: Duration,
    pub probe_timeout: Duration,
    pub channel_probe_attempts: u32,
    pub channel_probe_wait: Duration,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            status_root: STATUS_ROOT.to_string(),
            heartbeat_interval: Duration::from_secs(15),
            network_debounce: Duration::from_millis(2000),
            channel_debounce: Duration::from_millis(3000),
            directory_refresh: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            channel_probe_attempts: 2,
            channel_probe_wait: Duration::from_millis(500),
        }
    }
}
