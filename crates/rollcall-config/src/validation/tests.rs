//! Tests for the full validation pipeline.

use super::*;
use crate::schema::*;

#[test]
fn default_config_validates() {
    assert!(validate(&RollcallConfig::default()).is_ok());
}

#[test]
fn catches_empty_status_root() {
    let mut config = RollcallConfig::default();
    config.presence.status_root = "  ".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.status_root"));
}

#[test]
fn catches_slashed_status_root() {
    let mut config = RollcallConfig::default();
    config.presence.status_root = "/status".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("must not start or end"));
}

#[test]
fn catches_heartbeat_too_fast() {
    let mut config = RollcallConfig::default();
    config.presence.heartbeat_interval_secs = 1;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.heartbeat_interval_secs = 1 is out of range [5, 300]"));
}

#[test]
fn catches_zero_probe_attempts() {
    let mut config = RollcallConfig::default();
    config.presence.channel_probe_attempts = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.channel_probe_attempts"));
}

#[test]
fn zero_debounce_is_allowed() {
    let mut config = RollcallConfig::default();
    config.presence.network_debounce_ms = 0;
    config.presence.channel_debounce_ms = 0;
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_http_url() {
    let mut config = RollcallConfig::default();
    config.realtime.url = "https://rt.example.org".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("realtime.url"));
}

#[test]
fn accepts_wss_url() {
    let mut config = RollcallConfig::default();
    config.realtime.url = "wss://rt.example.org/socket".into();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_inverted_reconnect_delays() {
    let mut config = RollcallConfig::default();
    config.realtime.reconnect_delay_secs = 20;
    config.realtime.max_reconnect_delay_secs = 10;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("below realtime.reconnect_delay_secs"));
}

#[test]
fn catches_probe_target_without_port() {
    let mut config = RollcallConfig::default();
    config.reachability.probe_target = "example.org".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("reachability.probe_target"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = RollcallConfig::default();
    config.presence.probe_timeout_secs = 0;
    config.reachability.poll_interval_secs = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.probe_timeout_secs"));
    assert!(err.contains("reachability.poll_interval_secs"));
    assert!(err.contains("; "));
}
