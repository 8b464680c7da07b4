//! Turns loaded config into presence components.

use std::sync::Arc;
use std::time::Duration;

use rollcall_config::{PresenceConfig, ReachabilityConfig, RealtimeConfig};
use rollcall_presence::{
    MemoryStore, PresenceSettings, RealtimeClient, RealtimeClientConfig, RealtimeStore,
    TcpReachability,
};

fn secs(n: u32) -> Duration {
    Duration::from_secs(u64::from(n))
}

fn millis(n: u32) -> Duration {
    Duration::from_millis(u64::from(n))
}

pub fn presence_settings(cfg: &PresenceConfig) -> PresenceSettings {
    PresenceSettings {
        status_root: cfg.status_root.clone(),
        heartbeat_interval: secs(cfg.heartbeat_interval_secs),
        network_debounce: millis(cfg.network_debounce_ms),
        channel_debounce: millis(cfg.channel_debounce_ms),
        directory_refresh: secs(cfg.directory_refresh_secs),
        probe_timeout: secs(cfg.probe_timeout_secs),
        channel_probe_attempts: cfg.channel_probe_attempts,
        channel_probe_wait: millis(cfg.channel_probe_wait_ms),
    }
}

pub fn realtime_config(cfg: &RealtimeConfig, url: &str, token: Option<&str>) -> RealtimeClientConfig {
    let config = RealtimeClientConfig::new(url)
        .with_heartbeat_interval(secs(cfg.heartbeat_interval_secs))
        .with_reconnect_delay(
            secs(cfg.reconnect_delay_secs),
            secs(cfg.max_reconnect_delay_secs),
        )
        .with_request_timeout(secs(cfg.request_timeout_secs))
        .with_connect_timeout(secs(cfg.connect_timeout_secs));
    match token {
        Some(token) => config.with_access_token(token),
        None => config,
    }
}

pub fn reachability(cfg: &ReachabilityConfig, probe_timeout: Duration) -> TcpReachability {
    TcpReachability::new(
        cfg.probe_target.clone(),
        secs(cfg.poll_interval_secs),
        probe_timeout,
    )
}

/// Where presence records live for this process.
pub enum Backend {
    Remote(Arc<RealtimeClient>),
    Memory(Arc<MemoryStore>),
}

impl Backend {
    /// Connect to the realtime endpoint, or fall back to an always-connected
    /// in-memory store when no endpoint is configured.
    pub fn open(cfg: &RealtimeConfig, url_override: Option<&str>, token: Option<&str>) -> Self {
        let url = url_override.unwrap_or(&cfg.url);
        if url.is_empty() {
            let store = Arc::new(MemoryStore::new());
            store.set_connected(true);
            return Backend::Memory(store);
        }
        Backend::Remote(Arc::new(RealtimeClient::connect(realtime_config(
            cfg, url, token,
        ))))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Remote(_) => "realtime",
            Backend::Memory(_) => "memory",
        }
    }

    pub fn store(&self) -> Arc<dyn RealtimeStore> {
        match self {
            Backend::Remote(client) => client.clone(),
            Backend::Memory(store) => store.clone(),
        }
    }

    pub fn shutdown(&self) {
        match self {
            Backend::Remote(client) => client.shutdown(),
            Backend::Memory(store) => store.set_connected(false),
        }
    }
}
