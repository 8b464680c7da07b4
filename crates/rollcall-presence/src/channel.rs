//! Realtime channel connection flag.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::PresenceError;
use crate::store::RealtimeStore;

/// Deduplicated view of the channel's own "connected" flag.
///
/// An unauthenticated monitor never subscribes to the store and reports a
/// constant `false`.
pub struct ChannelMonitor {
    store: Option<Arc<dyn RealtimeStore>>,
    // Shared with the forwarding task; direct probes publish here too.
    state: Arc<watch::Sender<bool>>,
    cancel: CancellationToken,
}

impl ChannelMonitor {
    pub fn unauthenticated() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            store: None,
            state: Arc::new(state),
            cancel: CancellationToken::new(),
        }
    }

    /// Follow the store's connection flag. Must be called from within a
    /// tokio runtime.
    pub fn start(store: Arc<dyn RealtimeStore>) -> Self {
        let (state, _) = watch::channel(false);
        let state = Arc::new(state);
        let cancel = CancellationToken::new();
        let mut flag = store.connection_flag();

        let state_tx = state.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            publish(&state_tx, *flag.borrow_and_update());
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = flag.changed() => {
                        if changed.is_err() {
                            publish(&state_tx, false);
                            break;
                        }
                        let connected = *flag.borrow_and_update();
                        publish(&state_tx, connected);
                    }
                }
            }
        });

        Self {
            store: Some(store),
            state,
            cancel,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_some()
    }

    pub fn current(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Ask the channel directly, skipping the cached flag. A definite answer
    /// is published; errors leave the flag as it was.
    pub async fn probe(&self) -> Result<bool, PresenceError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let connected = store.probe_connection().await?;
        publish(&self.state, connected);
        Ok(connected)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ChannelMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn publish(tx: &watch::Sender<bool>, connected: bool) {
    let changed = tx.send_if_modified(|current| {
        if *current == connected {
            false
        } else {
            *current = connected;
            true
        }
    });
    if changed {
        debug!(connected, "channel connection changed");
    }
}
