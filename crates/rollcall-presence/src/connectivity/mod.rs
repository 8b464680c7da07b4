//! Device network reachability.
//!
//! [`ConnectivityMonitor`] turns raw readings from a [`Reachability`] source
//! into a deduplicated boolean: subscribers are woken once per actual
//! transition. A failed reading counts as "not reachable" unless it was a
//! permission error, which leaves the cached value alone.

mod probe;

pub use probe::TcpReachability;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{report, ErrorClass, PresenceError};
use crate::store::Reachability;

pub struct ConnectivityMonitor {
    source: Arc<dyn Reachability>,
    // Shared with the reading task; direct probes publish here too.
    state: Arc<watch::Sender<bool>>,
    cancel: CancellationToken,
}

impl ConnectivityMonitor {
    /// Subscribe to `source` and start tracking its readings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(source: Arc<dyn Reachability>) -> Self {
        let (state, _) = watch::channel(false);
        let state = Arc::new(state);
        let cancel = CancellationToken::new();
        let mut readings = source.readings();

        let state_tx = state.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    reading = readings.recv() => {
                        let Some(reading) = reading else {
                            publish(&state_tx, false);
                            break;
                        };
                        if let Some(reachable) = reading_to_state("reachability", reading) {
                            publish(&state_tx, reachable);
                        }
                    }
                }
            }
        });

        Self {
            source,
            state,
            cancel,
        }
    }

    pub fn current(&self) -> bool {
        *self.state.borrow()
    }

    /// Receiver that changes once per reachability transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Probe the source directly, bypassing the cached value, and publish
    /// the result so later readings are compared against it.
    ///
    /// Failures and timeouts are reported and read as unreachable. A
    /// permission error returns the cached value unchanged.
    pub async fn probe(&self, timeout: Duration) -> bool {
        let reading = match tokio::time::timeout(timeout, self.source.probe()).await {
            Ok(reading) => reading_to_state("reachability probe", reading),
            Err(_) => {
                report("reachability probe", &PresenceError::Timeout(timeout));
                Some(false)
            }
        };
        match reading {
            Some(reachable) => {
                publish(&self.state, reachable);
                reachable
            }
            None => self.current(),
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// `None` means the reading must not change state.
fn reading_to_state(context: &str, reading: Result<bool, PresenceError>) -> Option<bool> {
    match reading {
        Ok(reachable) => Some(reachable),
        Err(e) => match report(context, &e) {
            ErrorClass::Permission => None,
            ErrorClass::Transient | ErrorClass::Unknown => Some(false),
        },
    }
}

fn publish(tx: &watch::Sender<bool>, reachable: bool) {
    let changed = tx.send_if_modified(|current| {
        if *current == reachable {
            false
        } else {
            *current = reachable;
            true
        }
    });
    if changed {
        debug!(reachable, "network reachability changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ManualReachability;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn starts_false_and_follows_readings() {
        let source = Arc::new(ManualReachability::new());
        let monitor = ConnectivityMonitor::start(source.clone());
        assert!(!monitor.current());

        source.set(true);
        settle().await;
        assert!(monitor.current());

        source.set(false);
        settle().await;
        assert!(!monitor.current());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_readings_do_not_wake_subscribers() {
        let source = Arc::new(ManualReachability::new());
        let monitor = ConnectivityMonitor::start(source.clone());
        let mut rx = monitor.subscribe();

        source.set(true);
        settle().await;
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        source.set(true);
        source.set(true);
        settle().await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reading_counts_as_loss() {
        let source = Arc::new(ManualReachability::new());
        let monitor = ConnectivityMonitor::start(source.clone());
        let mut rx = monitor.subscribe();

        source.set(true);
        settle().await;
        rx.borrow_and_update();

        source.fail(PresenceError::Transport("interface down".into()));
        settle().await;
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test(start_paused = true)]
    async fn permission_error_reading_keeps_state() {
        let source = Arc::new(ManualReachability::new());
        let monitor = ConnectivityMonitor::start(source.clone());
        let mut rx = monitor.subscribe();

        source.set(true);
        settle().await;
        rx.borrow_and_update();

        source.fail(PresenceError::PermissionDenied("signed out".into()));
        settle().await;
        assert!(!rx.has_changed().unwrap());
        assert!(monitor.current());
    }

    #[tokio::test(start_paused = true)]
    async fn direct_check_updates_cached_value() {
        let source = Arc::new(ManualReachability::new());
        let monitor = ConnectivityMonitor::start(source.clone());
        source.set_probe(Ok(true));

        assert!(!monitor.current());
        assert!(monitor.probe(Duration::from_secs(5)).await);
        assert!(monitor.current());

        source.set_probe(Ok(false));
        assert!(!monitor.probe(Duration::from_secs(5)).await);
        assert!(!monitor.current());
    }

    #[tokio::test(start_paused = true)]
    async fn permission_error_on_direct_check_returns_cached_value() {
        let source = Arc::new(ManualReachability::new());
        let monitor = ConnectivityMonitor::start(source.clone());
        source.set(true);
        settle().await;

        source.set_probe(Err(PresenceError::PermissionDenied("signed out".into())));
        assert!(monitor.probe(Duration::from_secs(5)).await);
        assert!(monitor.current());
    }

    #[tokio::test(start_paused = true)]
    async fn reading_after_failed_direct_check_is_seen() {
        let source = Arc::new(ManualReachability::new());
        let monitor = ConnectivityMonitor::start(source.clone());
        source.set(true);
        settle().await;
        let mut rx = monitor.subscribe();
        rx.borrow_and_update();

        source.set_probe(Ok(false));
        assert!(!monitor.probe(Duration::from_secs(5)).await);
        assert!(!*rx.borrow_and_update());

        source.set(true);
        settle().await;
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_times_out_as_unreachable() {
        let source = Arc::new(ManualReachability::new());
        source.hang_probe(true);
        let monitor = ConnectivityMonitor::start(source.clone());

        let started = tokio::time::Instant::now();
        assert!(!monitor.probe(Duration::from_secs(5)).await);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_tracking() {
        let source = Arc::new(ManualReachability::new());
        let monitor = ConnectivityMonitor::start(source.clone());
        monitor.stop();
        settle().await;

        source.set(true);
        settle().await;
        assert!(!monitor.current());
    }
}
