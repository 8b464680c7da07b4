//! Per-session presence root.
//!
//! A [`PresenceManager`] is built on sign-in and owns every component of the
//! session. [`PresenceManager::sign_out`] writes the graceful offline
//! record and tears the components down; after that the manager is inert.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rollcall_common::events::EventBus;
use rollcall_common::SessionId;
use tokio::sync::{watch, Notify};
use tracing::info;

use crate::aggregator::{
    run_recheck, AggregatorInputs, AggregatorSinks, LocalConnectionState, PresenceAggregator,
    RecheckOutcome,
};
use crate::callbacks::{CallbackHandle, CallbackRegistry, ConnectionCallbacks};
use crate::channel::ChannelMonitor;
use crate::connectivity::ConnectivityMonitor;
use crate::directory::PresenceDirectory;
use crate::error::report;
use crate::heartbeat::HeartbeatScheduler;
use crate::identity::Identity;
use crate::protocol::{status_path, AppState, PresenceRecord};
use crate::registrar::{DisconnectRegistrar, PresenceWriter};
use crate::settings::PresenceSettings;
use crate::store::RealtimeStore;

pub struct PresenceManager {
    session_id: SessionId,
    identity: Identity,
    settings: PresenceSettings,
    connectivity: Arc<ConnectivityMonitor>,
    channel: ChannelMonitor,
    aggregator: PresenceAggregator,
    registrar: DisconnectRegistrar,
    heartbeat: HeartbeatScheduler,
    directory: Arc<PresenceDirectory>,
    callbacks: Arc<CallbackRegistry>,
    writer: PresenceWriter,
    app: watch::Sender<AppState>,
    signed_out: AtomicBool,
}

impl PresenceManager {
    /// Start a session for `identity`. Must be called from within a tokio
    /// runtime.
    pub fn start(
        identity: Identity,
        store: Arc<dyn RealtimeStore>,
        connectivity: Arc<ConnectivityMonitor>,
        settings: PresenceSettings,
        bus: EventBus,
    ) -> Self {
        let path = status_path(&settings.status_root, &identity.user_id);
        let writer = PresenceWriter::new(store.clone(), path);
        let channel = ChannelMonitor::start(store.clone());
        let (app, _) = watch::channel(AppState::default());
        let callbacks = Arc::new(CallbackRegistry::new());
        let trigger = Arc::new(Notify::new());

        let aggregator = PresenceAggregator::start(
            AggregatorInputs {
                network: connectivity.subscribe(),
                channel: channel.subscribe(),
                app: app.subscribe(),
            },
            &settings,
            AggregatorSinks {
                callbacks: callbacks.clone(),
                bus,
                directory: trigger.clone(),
                writer: writer.clone(),
            },
        );

        let registrar =
            DisconnectRegistrar::start(writer.clone(), channel.subscribe(), app.subscribe());
        let heartbeat = HeartbeatScheduler::start(
            writer.clone(),
            aggregator.subscribe(),
            settings.heartbeat_interval,
        );

        let directory = Arc::new(PresenceDirectory::new(
            store,
            settings.status_root.clone(),
            identity.user_id.clone(),
            settings.directory_refresh,
        ));
        directory.spawn_refresher(aggregator.subscribe(), trigger, settings.directory_refresh);

        let session_id = SessionId::new();
        info!(
            session = session_id.short(),
            user_id = %identity.user_id,
            path = writer.path(),
            "presence session started"
        );

        Self {
            session_id,
            identity,
            settings,
            connectivity,
            channel,
            aggregator,
            registrar,
            heartbeat,
            directory,
            callbacks,
            writer,
            app,
            signed_out: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> LocalConnectionState {
        self.aggregator.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocalConnectionState> {
        self.aggregator.subscribe()
    }

    /// Raw (undebounced) channel flag.
    pub fn is_channel_connected(&self) -> bool {
        self.channel.current()
    }

    pub async fn online_users(&self) -> HashMap<String, PresenceRecord> {
        self.directory.online_users().await
    }

    /// Refresh the directory now. Returns `false` if a refresh was already
    /// running.
    pub async fn refresh_status(&self) -> bool {
        self.directory.refresh().await
    }

    pub async fn force_recheck(&self) -> RecheckOutcome {
        let outcome = run_recheck(&self.connectivity, &self.channel, &self.settings).await;
        info!(?outcome, "forced presence recheck");
        if let Err(e) = self.aggregator.apply_recheck(outcome).await {
            report("recheck", &e);
        }
        outcome
    }

    pub async fn is_user_online(&self, user_id: &str) -> bool {
        self.directory.is_user_online(user_id).await
    }

    pub fn register_callbacks(&self, callbacks: ConnectionCallbacks) -> CallbackHandle {
        self.callbacks.register(callbacks)
    }

    pub fn set_app_state(&self, app: AppState) {
        self.app.send_if_modified(|current| {
            if *current == app {
                false
            } else {
                *current = app;
                true
            }
        });
    }

    /// Write-on-disconnect registrations made by this session.
    pub fn registrations(&self) -> usize {
        self.registrar.registrations()
    }

    pub fn is_signed_out(&self) -> bool {
        self.signed_out.load(Ordering::SeqCst)
    }

    /// Graceful sign-out. Safe to call more than once.
    pub async fn sign_out(&self) {
        if self.signed_out.swap(true, Ordering::SeqCst) {
            return;
        }

        self.heartbeat.stop();
        self.registrar.stop();
        self.aggregator.stop();
        self.writer.deactivate();

        if self.channel.current() {
            if let Err(e) = self.writer.mark_offline().await {
                report("sign-out offline write", &e);
            }
        }

        self.directory.stop().await;
        self.channel.stop();
        self.callbacks.clear();
        info!(
            session = self.session_id.short(),
            user_id = %self.identity.user_id,
            "presence session ended"
        );
    }
}

impl Drop for PresenceManager {
    fn drop(&mut self) {
        self.writer.deactivate();
    }
}
