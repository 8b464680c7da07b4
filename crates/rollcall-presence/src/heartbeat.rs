//! Periodic `last_active` refresh while online.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::aggregator::LocalConnectionState;
use crate::error::report;
use crate::registrar::PresenceWriter;

pub struct HeartbeatScheduler {
    cancel: CancellationToken,
}

impl HeartbeatScheduler {
    /// Tick every `period`; ticks while offline are skipped. Failures are
    /// reported and left for the next tick.
    pub fn start(
        writer: PresenceWriter,
        state: watch::Receiver<LocalConnectionState>,
        period: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !state.borrow().is_online {
                            trace!("heartbeat skipped while offline");
                            continue;
                        }
                        if let Err(e) = writer.touch().await {
                            report("heartbeat", &e);
                        }
                    }
                }
            }
        });

        Self { cancel }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
