//! Presence timing validation.

use super::helpers::validate_range;
use crate::schema::RollcallConfig;

pub(super) fn validate_presence(errors: &mut Vec<String>, config: &RollcallConfig) {
    let p = &config.presence;

    let root = p.status_root.trim();
    if root.is_empty() {
        errors.push("presence.status_root must not be empty".into());
    } else if root.starts_with('/') || root.ends_with('/') {
        errors.push(format!(
            "presence.status_root = {root:?} must not start or end with '/'"
        ));
    }

    validate_range(errors, "presence.heartbeat_interval_secs", p.heartbeat_interval_secs, 5, 300);
    validate_range(errors, "presence.network_debounce_ms", p.network_debounce_ms, 0, 30_000);
    validate_range(errors, "presence.channel_debounce_ms", p.channel_debounce_ms, 0, 30_000);
    validate_range(errors, "presence.directory_refresh_secs", p.directory_refresh_secs, 5, 600);
    validate_range(errors, "presence.probe_timeout_secs", p.probe_timeout_secs, 1, 60);
    validate_range(errors, "presence.channel_probe_attempts", p.channel_probe_attempts, 1, 10);
    validate_range(errors, "presence.channel_probe_wait_ms", p.channel_probe_wait_ms, 0, 10_000);
}
