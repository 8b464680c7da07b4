//! Device reachability probe configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachabilityConfig {
    /// `host:port` a TCP connect is attempted against.
    pub probe_target: String,
    /// Poll period for the reachability signal (valid range: 1-300).
    pub poll_interval_secs: u32,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            probe_target: "1.1.1.1:443".into(),
            poll_interval_secs: 5,
        }
    }
}
