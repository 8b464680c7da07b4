//! Realtime channel connection configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the realtime channel.
///
/// The access token is never read from the file; it comes from the
/// identity provider at sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// WebSocket endpoint (`ws://` or `wss://`). Empty disables the channel.
    pub url: String,
    /// Transport keepalive period (valid range: 5-120).
    pub heartbeat_interval_secs: u32,
    /// Reconnect base delay (valid range: 1-60).
    pub reconnect_delay_secs: u32,
    /// Reconnect delay cap (valid range: 1-600).
    pub max_reconnect_delay_secs: u32,
    /// Per-request reply timeout (valid range: 1-120).
    pub request_timeout_secs: u32,
    /// WebSocket handshake timeout (valid range: 1-120).
    pub connect_timeout_secs: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            heartbeat_interval_secs: 25,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
            request_timeout_secs: 10,
            connect_timeout_secs: 15,
        }
    }
}
