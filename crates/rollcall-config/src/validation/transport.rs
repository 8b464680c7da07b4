//! Realtime channel and reachability validation.

use super::helpers::validate_range;
use crate::schema::RollcallConfig;

pub(super) fn validate_realtime(errors: &mut Vec<String>, config: &RollcallConfig) {
    let rt = &config.realtime;

    if !rt.url.is_empty() && !(rt.url.starts_with("ws://") || rt.url.starts_with("wss://")) {
        errors.push(format!(
            "realtime.url = {:?} must use ws:// or wss://",
            rt.url
        ));
    }

    validate_range(errors, "realtime.heartbeat_interval_secs", rt.heartbeat_interval_secs, 5, 120);
    validate_range(errors, "realtime.reconnect_delay_secs", rt.reconnect_delay_secs, 1, 60);
    validate_range(errors, "realtime.max_reconnect_delay_secs", rt.max_reconnect_delay_secs, 1, 600);
    validate_range(errors, "realtime.request_timeout_secs", rt.request_timeout_secs, 1, 120);
    validate_range(errors, "realtime.connect_timeout_secs", rt.connect_timeout_secs, 1, 120);

    if rt.max_reconnect_delay_secs < rt.reconnect_delay_secs {
        errors.push(format!(
            "realtime.max_reconnect_delay_secs = {} is below realtime.reconnect_delay_secs = {}",
            rt.max_reconnect_delay_secs, rt.reconnect_delay_secs
        ));
    }
}

pub(super) fn validate_reachability(errors: &mut Vec<String>, config: &RollcallConfig) {
    let r = &config.reachability;

    match r.probe_target.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
        _ => errors.push(format!(
            "reachability.probe_target = {:?} must be host:port",
            r.probe_target
        )),
    }

    validate_range(errors, "reachability.poll_interval_secs", r.poll_interval_secs, 1, 300);
}
