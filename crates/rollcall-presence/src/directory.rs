//! Read path for other users' presence.
//!
//! The cache is refreshed in bulk on a fixed period while the channel is
//! connected and whenever the aggregator asks for it. Entries older than
//! the TTL count as misses, and misses go to the remote record instead of
//! assuming offline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{watch, Notify, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::aggregator::LocalConnectionState;
use crate::error::{report, PresenceError};
use crate::protocol::{status_path, PresenceRecord};
use crate::store::RealtimeStore;

pub struct PresenceDirectory {
    store: Arc<dyn RealtimeStore>,
    root: String,
    self_id: String,
    cache: RwLock<HashMap<String, CachedRecord>>,
    ttl: Duration,
    refreshing: AtomicBool,
    cancel: CancellationToken,
}

struct CachedRecord {
    record: PresenceRecord,
    fetched_at: Instant,
}

impl CachedRecord {
    fn new(record: PresenceRecord, fetched_at: Instant) -> Self {
        Self { record, fetched_at }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() <= ttl
    }
}

struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PresenceDirectory {
    pub fn new(
        store: Arc<dyn RealtimeStore>,
        root: impl Into<String>,
        self_id: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            root: root.into(),
            self_id: self_id.into(),
            cache: RwLock::new(HashMap::new()),
            ttl,
            refreshing: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Reload every record under the status root.
    ///
    /// Returns `false` without reading when a refresh is already running.
    /// On error the previous cache is kept.
    pub async fn refresh(&self) -> bool {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            trace!("directory refresh already in flight");
            return false;
        }
        let _guard = RefreshGuard(&self.refreshing);

        match self.store.get(&self.root).await {
            Ok(listing) => {
                let fetched_at = Instant::now();
                let records: HashMap<_, _> = parse_listing(listing)
                    .into_iter()
                    .map(|(id, record)| (id, CachedRecord::new(record, fetched_at)))
                    .collect();
                if self.cancel.is_cancelled() {
                    return true;
                }
                debug!(count = records.len(), "directory refreshed");
                *self.cache.write().await = records;
            }
            Err(e) => {
                report("directory refresh", &e);
            }
        }
        true
    }

    /// Users whose fresh cached record says online.
    pub async fn online_users(&self) -> HashMap<String, PresenceRecord> {
        self.cache
            .read()
            .await
            .iter()
            .filter(|(_, c)| c.is_fresh(self.ttl) && c.record.is_online())
            .map(|(id, c)| (id.clone(), c.record.clone()))
            .collect()
    }

    /// Cached record for `user_id`, unless it has outlived the TTL.
    pub async fn cached(&self, user_id: &str) -> Option<PresenceRecord> {
        self.cache
            .read()
            .await
            .get(user_id)
            .filter(|c| c.is_fresh(self.ttl))
            .map(|c| c.record.clone())
    }

    /// The current user is always online to itself. Lookup errors read as
    /// offline.
    pub async fn is_user_online(&self, user_id: &str) -> bool {
        if user_id == self.self_id {
            return true;
        }
        if let Some(record) = self.cached(user_id).await {
            return record.is_online();
        }

        match self.lookup(user_id).await {
            Ok(Some(record)) => {
                let online = record.is_online();
                if !self.cancel.is_cancelled() {
                    self.cache
                        .write()
                        .await
                        .insert(user_id.to_string(), CachedRecord::new(record, Instant::now()));
                }
                online
            }
            Ok(None) => false,
            Err(e) => {
                report("presence lookup", &e);
                false
            }
        }
    }

    async fn lookup(&self, user_id: &str) -> Result<Option<PresenceRecord>, PresenceError> {
        let path = status_path(&self.root, user_id);
        match self.store.get(&path).await? {
            Some(value) => Ok(Some(PresenceRecord::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Refresh every `period` while the published channel flag is up, and
    /// on each `trigger` notification.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        state: watch::Receiver<LocalConnectionState>,
        trigger: Arc<Notify>,
        period: Duration,
    ) {
        let directory = self.clone();
        let token = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if state.borrow().is_channel_connected {
                            directory.refresh().await;
                        }
                    }
                    _ = trigger.notified() => {
                        directory.refresh().await;
                    }
                }
            }
        });
    }

    /// Stop the refresher and drop cached records.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.cache.write().await.clear();
    }
}

fn parse_listing(listing: Option<Value>) -> HashMap<String, PresenceRecord> {
    let Some(Value::Object(entries)) = listing else {
        return HashMap::new();
    };
    entries
        .into_iter()
        .filter_map(|(id, value)| match PresenceRecord::from_value(value) {
            Ok(record) => Some((id, record)),
            Err(e) => {
                debug!(user_id = %id, error = %e, "skipping malformed presence record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::protocol::PresenceState;
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, Arc<PresenceDirectory>) {
        let store = Arc::new(MemoryStore::new());
        store.set_connected(true);
        let dir = Arc::new(PresenceDirectory::new(
            store.clone(),
            "status",
            "me",
            Duration::from_secs(30),
        ));
        (store, dir)
    }

    fn connected() -> LocalConnectionState {
        LocalConnectionState {
            is_network_connected: true,
            is_channel_connected: true,
            is_online: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn self_is_always_online() {
        let (store, dir) = setup();
        store.set_connected(false);
        assert!(dir.is_user_online("me").await);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn refresh_keeps_only_online_in_listing() {
        let (store, dir) = setup();
        store.insert("status/a", json!({"state": "online", "last_active": 1}));
        store.insert("status/b", json!({"state": "offline", "last_active": 2}));
        store.insert("status/c", json!({"state": "background", "last_active": 3}));
        store.insert("status/bad", json!({"state": 7}));

        assert!(dir.refresh().await);
        let online = dir.online_users().await;
        assert_eq!(online.len(), 1);
        assert!(online.contains_key("a"));
        assert_eq!(
            dir.cached("c").await.map(|r| r.state),
            Some(PresenceState::Background)
        );
        assert_eq!(dir.cached("bad").await, None);
    }

    #[tokio::test]
    async fn cache_hit_skips_lookup() {
        let (store, dir) = setup();
        store.insert("status/a", json!({"state": "online"}));
        dir.refresh().await;
        let reads = store.reads();

        assert!(dir.is_user_online("a").await);
        assert_eq!(store.reads(), reads);
    }

    #[tokio::test]
    async fn miss_verifies_against_remote() {
        let (store, dir) = setup();
        dir.refresh().await;
        store.insert("status/late", json!({"state": "online"}));

        assert!(dir.is_user_online("late").await);
        assert!(dir.cached("late").await.is_some());
    }

    #[tokio::test]
    async fn failed_lookup_is_offline() {
        let (store, dir) = setup();
        store.insert("status/x", json!({"state": "online"}));
        store.fail_path("status/x", PresenceError::Transport("reset".into()));

        assert!(!dir.is_user_online("x").await);
        assert_eq!(dir.cached("x").await, None);
    }

    #[tokio::test]
    async fn missing_record_is_offline() {
        let (_store, dir) = setup();
        assert!(!dir.is_user_online("nobody").await);
    }

    #[tokio::test]
    async fn refresh_error_keeps_previous_cache() {
        let (store, dir) = setup();
        store.insert("status/a", json!({"state": "online"}));
        dir.refresh().await;

        store.fail_path("status", PresenceError::PermissionDenied("status".into()));
        dir.refresh().await;
        assert_eq!(dir.online_users().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_go_back_to_the_remote() {
        let (store, dir) = setup();
        store.insert("status/a", json!({"state": "online"}));
        dir.refresh().await;
        assert!(dir.is_user_online("a").await);

        store.set_connected(false);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(dir.is_user_online("a").await);

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(dir.cached("a").await, None);
        assert!(dir.online_users().await.is_empty());
        // The remote read fails while disconnected, which reads as offline.
        assert!(!dir.is_user_online("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_is_refetched_when_connected() {
        let (store, dir) = setup();
        store.insert("status/a", json!({"state": "online"}));
        dir.refresh().await;
        let reads = store.reads();

        tokio::time::sleep(Duration::from_secs(31)).await;
        store.insert("status/a", json!({"state": "offline"}));
        assert!(!dir.is_user_online("a").await);
        assert_eq!(store.reads(), reads + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_coalesce() {
        let (store, dir) = setup();
        store.insert("status/a", json!({"state": "online"}));
        store.set_read_delay(Some(Duration::from_millis(50)));

        let (first, second) = tokio::join!(dir.refresh(), dir.refresh());
        assert!(first);
        assert!(!second);
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresher_ticks_only_while_channel_connected() {
        let (store, dir) = setup();
        let (state_tx, state) = watch::channel(LocalConnectionState::default());
        dir.spawn_refresher(state, Arc::new(Notify::new()), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.reads(), 0);

        state_tx.send_replace(connected());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.reads(), 2);
        dir.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_forces_refresh() {
        let (store, dir) = setup();
        let (_state_tx, state) = watch::channel(LocalConnectionState::default());
        let trigger = Arc::new(Notify::new());
        dir.spawn_refresher(state, trigger.clone(), Duration::from_secs(30));

        trigger.notify_one();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_cache_and_ends_refresher() {
        let (store, dir) = setup();
        store.insert("status/a", json!({"state": "online"}));
        let (_state_tx, state) = watch::channel(connected());
        let trigger = Arc::new(Notify::new());
        dir.spawn_refresher(state, trigger.clone(), Duration::from_secs(30));
        dir.refresh().await;

        dir.stop().await;
        assert!(dir.online_users().await.is_empty());
        tokio::time::sleep(Duration::from_millis(1)).await;

        trigger.notify_one();
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(store.reads(), 1);
    }
}
