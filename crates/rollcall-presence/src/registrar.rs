//! Writes to the current user's presence record.
//!
//! The record has exactly one client-side writer per session: every write
//! goes through [`PresenceWriter`]. [`DisconnectRegistrar`] re-arms the
//! server-side offline write on each channel connect, then marks the user
//! online.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{report, PresenceError};
use crate::protocol::{heartbeat_payload, record_payload, AppState, PresenceState};
use crate::store::RealtimeStore;

#[derive(Clone)]
pub struct PresenceWriter {
    store: Arc<dyn RealtimeStore>,
    path: String,
    active: Arc<AtomicBool>,
}

impl PresenceWriter {
    pub fn new(store: Arc<dyn RealtimeStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop all further state and heartbeat writes for this session.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub async fn arm_disconnect(&self) -> Result<(), PresenceError> {
        self.store
            .on_disconnect_set(&self.path, record_payload(PresenceState::Offline))
            .await
    }

    /// Write the remote state matching the local app lifecycle.
    pub async fn mark_app_state(&self, app: AppState) -> Result<(), PresenceError> {
        self.write_state(app.remote_state()).await
    }

    /// Refresh `last_active` without touching `state`.
    pub async fn touch(&self) -> Result<(), PresenceError> {
        if !self.is_active() {
            return Ok(());
        }
        self.store.update(&self.path, heartbeat_payload()).await
    }

    /// Graceful offline write. Runs even after [`PresenceWriter::deactivate`].
    pub async fn mark_offline(&self) -> Result<(), PresenceError> {
        self.store
            .set(&self.path, record_payload(PresenceState::Offline))
            .await
    }

    async fn write_state(&self, state: PresenceState) -> Result<(), PresenceError> {
        if !self.is_active() {
            return Ok(());
        }
        self.store.set(&self.path, record_payload(state)).await
    }
}

pub struct DisconnectRegistrar {
    registrations: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl DisconnectRegistrar {
    /// Re-register on every transition of `channel` to connected.
    pub fn start(
        writer: PresenceWriter,
        mut channel: watch::Receiver<bool>,
        app: watch::Receiver<AppState>,
    ) -> Self {
        let registrations = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let count = registrations.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            // The monitor dedups, so every observed `true` is a fresh session.
            let mut connected = *channel.borrow_and_update();
            loop {
                if connected {
                    let app_state = *app.borrow();
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = on_connected(&writer, app_state, &count) => {}
                    }
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = channel.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        connected = *channel.borrow_and_update();
                    }
                }
            }
        });

        Self {
            registrations,
            cancel,
        }
    }

    /// Successful write-on-disconnect registrations so far.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DisconnectRegistrar {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Arm the offline hook, then write the online state.
async fn on_connected(writer: &PresenceWriter, app: AppState, count: &AtomicUsize) {
    if let Err(e) = writer.arm_disconnect().await {
        report("disconnect registration", &e);
        return;
    }
    let n = count.fetch_add(1, Ordering::SeqCst) + 1;
    debug!(path = writer.path(), registrations = n, "write-on-disconnect armed");

    if !writer.is_active() {
        return;
    }
    match writer.mark_app_state(app).await {
        Ok(()) => info!(
            path = writer.path(),
            state = app.remote_state().as_str(),
            "presence record written"
        ),
        Err(e) => {
            report("online write", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, WriteKind};
    use std::time::Duration;

    const PATH: &str = "status/me";

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    fn setup() -> (Arc<MemoryStore>, PresenceWriter, watch::Sender<bool>, watch::Sender<AppState>) {
        let store = Arc::new(MemoryStore::new());
        let writer = PresenceWriter::new(store.clone(), PATH);
        let (chan_tx, _) = watch::channel(false);
        let (app_tx, _) = watch::channel(AppState::Active);
        (store, writer, chan_tx, app_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn arms_before_online_write() {
        let (store, writer, chan_tx, app_tx) = setup();
        let registrar = DisconnectRegistrar::start(writer, chan_tx.subscribe(), app_tx.subscribe());

        store.set_connected(true);
        chan_tx.send_replace(true);
        settle().await;

        let writes = store.writes();
        assert_eq!(writes[0].kind, WriteKind::OnDisconnect);
        assert_eq!(writes[1].kind, WriteKind::Set);
        assert!(store.record(PATH).unwrap().is_online());
        assert_eq!(registrar.registrations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn re_registers_on_every_reconnect() {
        let (store, writer, chan_tx, app_tx) = setup();
        let registrar = DisconnectRegistrar::start(writer, chan_tx.subscribe(), app_tx.subscribe());

        for _ in 0..4 {
            store.set_connected(true);
            chan_tx.send_replace(true);
            settle().await;
            store.set_connected(false);
            chan_tx.send_replace(false);
            settle().await;
        }

        assert_eq!(registrar.registrations(), 4);
        assert_eq!(store.count_writes(WriteKind::OnDisconnect, PATH), 4);
        assert_eq!(store.count_writes(WriteKind::DisconnectFired, PATH), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_registration_skips_online_write() {
        let (store, writer, chan_tx, app_tx) = setup();
        store.set_connected(true);
        store.fail_path(PATH, PresenceError::PermissionDenied(PATH.into()));
        let registrar = DisconnectRegistrar::start(writer, chan_tx.subscribe(), app_tx.subscribe());

        chan_tx.send_replace(true);
        settle().await;

        assert_eq!(registrar.registrations(), 0);
        assert_eq!(store.count_writes(WriteKind::Set, PATH), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backgrounded_app_writes_app_state() {
        let (store, writer, chan_tx, app_tx) = setup();
        app_tx.send_replace(AppState::Background);
        let _registrar = DisconnectRegistrar::start(writer, chan_tx.subscribe(), app_tx.subscribe());

        store.set_connected(true);
        chan_tx.send_replace(true);
        settle().await;

        assert_eq!(store.record(PATH).unwrap().state, PresenceState::Background);
    }

    #[tokio::test(start_paused = true)]
    async fn deactivated_writer_only_arms() {
        let (store, writer, chan_tx, app_tx) = setup();
        writer.deactivate();
        let registrar =
            DisconnectRegistrar::start(writer.clone(), chan_tx.subscribe(), app_tx.subscribe());

        store.set_connected(true);
        chan_tx.send_replace(true);
        settle().await;

        assert_eq!(registrar.registrations(), 1);
        assert_eq!(store.count_writes(WriteKind::Set, PATH), 0);
        writer.touch().await.unwrap();
        assert_eq!(store.count_writes(WriteKind::Update, PATH), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_offline_ignores_deactivation() {
        let (store, writer, _chan_tx, _app_tx) = setup();
        store.set_connected(true);
        writer.deactivate();
        writer.mark_offline().await.unwrap();
        assert_eq!(store.record(PATH).unwrap().state, PresenceState::Offline);
    }
}
