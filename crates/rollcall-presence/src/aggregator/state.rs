use chrono::{DateTime, Utc};

use crate::protocol::AppState;

/// The single published connection state of a client instance.
///
/// `is_online == is_network_connected && is_channel_connected` holds for
/// every published value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalConnectionState {
    pub is_network_connected: bool,
    pub is_channel_connected: bool,
    pub is_online: bool,
    pub last_online_at: Option<DateTime<Utc>>,
    pub offline_since: Option<DateTime<Utc>>,
    pub app_state: AppState,
}

impl LocalConnectionState {
    /// Network is usable but the channel is not: "limited connectivity".
    pub fn is_limited(&self) -> bool {
        self.is_network_connected && !self.is_channel_connected
    }

    /// How the current user sees themself. A foregrounded app is present.
    pub fn shows_self_online(&self) -> bool {
        self.app_state.is_foreground()
    }
}

/// Result of a forced recheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecheckOutcome {
    /// Network and channel both confirmed.
    Online,
    /// The direct reachability probe failed.
    NoNetwork,
    /// Network reachable, channel not confirmed.
    Limited,
}
