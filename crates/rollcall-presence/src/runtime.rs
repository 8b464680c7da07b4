//! Application root: follows the sign-in state and owns the current
//! [`PresenceManager`].

use std::sync::Arc;

use rollcall_common::events::{Event, EventBus};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::channel::ChannelMonitor;
use crate::connectivity::ConnectivityMonitor;
use crate::identity::Identity;
use crate::manager::PresenceManager;
use crate::settings::PresenceSettings;
use crate::store::{Reachability, RealtimeStore};

type Session = Option<Arc<PresenceManager>>;

pub struct PresenceRuntime {
    connectivity: Arc<ConnectivityMonitor>,
    // Stands in for the channel while nobody is signed in.
    unauthenticated: ChannelMonitor,
    session: watch::Receiver<Session>,
    bus: EventBus,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PresenceRuntime {
    /// Start following `auth`. A `Some` identity starts a session; `None`
    /// signs the current one out.
    pub fn start(
        store: Arc<dyn RealtimeStore>,
        reachability: Arc<dyn Reachability>,
        auth: watch::Receiver<Option<Identity>>,
        settings: PresenceSettings,
        bus: EventBus,
    ) -> Self {
        let connectivity = Arc::new(ConnectivityMonitor::start(reachability));
        let (session_tx, session) = watch::channel(None);
        let cancel = CancellationToken::new();

        let follower = SessionFollower {
            store,
            connectivity: connectivity.clone(),
            settings,
            bus: bus.clone(),
            session_tx,
        };
        let task = tokio::spawn(follower.run(auth, cancel.clone()));

        Self {
            connectivity,
            unauthenticated: ChannelMonitor::unauthenticated(),
            session,
            bus,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn current(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Changes each time a session starts or ends.
    pub fn sessions(&self) -> watch::Receiver<Session> {
        self.session.clone()
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn is_channel_connected(&self) -> bool {
        match self.current() {
            Some(manager) => manager.is_channel_connected(),
            None => self.unauthenticated.current(),
        }
    }

    /// Sign out any active session and stop following auth changes.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "presence runtime task failed");
            }
        }
        self.connectivity.stop();
        self.bus.publish(Event::Shutdown);
    }
}

impl Drop for PresenceRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SessionFollower {
    store: Arc<dyn RealtimeStore>,
    connectivity: Arc<ConnectivityMonitor>,
    settings: PresenceSettings,
    bus: EventBus,
    session_tx: watch::Sender<Session>,
}

impl SessionFollower {
    async fn run(self, mut auth: watch::Receiver<Option<Identity>>, cancel: CancellationToken) {
        let initial = auth.borrow_and_update().clone();
        self.apply(initial).await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = auth.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let identity = auth.borrow_and_update().clone();
                    self.apply(identity).await;
                }
            }
        }

        self.end_session().await;
    }

    async fn apply(&self, identity: Option<Identity>) {
        let Some(identity) = identity else {
            self.end_session().await;
            return;
        };

        let same_user = self
            .session_tx
            .borrow()
            .as_ref()
            .is_some_and(|m| m.identity().user_id == identity.user_id);
        if same_user {
            return;
        }

        self.end_session().await;
        let user_id = identity.user_id.clone();
        let manager = PresenceManager::start(
            identity,
            self.store.clone(),
            self.connectivity.clone(),
            self.settings.clone(),
            self.bus.clone(),
        );
        self.session_tx.send_replace(Some(Arc::new(manager)));
        info!(user_id = %user_id, "signed in");
        self.bus.publish(Event::SignedIn { user_id });
    }

    async fn end_session(&self) {
        let Some(manager) = self.session_tx.send_replace(None) else {
            return;
        };
        manager.sign_out().await;
        let user_id = manager.identity().user_id.clone();
        info!(user_id = %user_id, "signed out");
        self.bus.publish(Event::SignedOut { user_id });
    }
}
