use tracing::debug;

use super::state::RecheckOutcome;
use crate::channel::ChannelMonitor;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{report, ErrorClass, PresenceError};
use crate::settings::PresenceSettings;

/// Probe the network path, then the channel, bypassing cached values.
///
/// Permission errors fall back to the monitors' cached values.
pub async fn run_recheck(
    connectivity: &ConnectivityMonitor,
    channel: &ChannelMonitor,
    settings: &PresenceSettings,
) -> RecheckOutcome {
    if !connectivity.probe(settings.probe_timeout).await {
        debug!("recheck: network unreachable");
        return RecheckOutcome::NoNetwork;
    }

    let attempts = settings.channel_probe_attempts.max(1);
    for attempt in 1..=attempts {
        match tokio::time::timeout(settings.probe_timeout, channel.probe()).await {
            Ok(Ok(true)) => {
                debug!(attempt, "recheck: channel confirmed");
                return RecheckOutcome::Online;
            }
            Ok(Ok(false)) => debug!(attempt, "recheck: channel not connected"),
            Ok(Err(e)) => {
                if report("channel probe", &e) == ErrorClass::Permission && channel.current() {
                    debug!(attempt, "recheck: keeping cached channel flag");
                    return RecheckOutcome::Online;
                }
            }
            Err(_) => {
                report(
                    "channel probe",
                    &PresenceError::Timeout(settings.probe_timeout),
                );
            }
        }
        if attempt < attempts {
            tokio::time::sleep(settings.channel_probe_wait).await;
        }
    }

    RecheckOutcome::Limited
}
