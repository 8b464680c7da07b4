//! One-shot `on_online` / `on_offline` hooks.
//!
//! Handlers fire once per published `is_online` transition. A handler may
//! unregister itself or others while the registry is dispatching.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::warn;

type Handler = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct ConnectionCallbacks {
    on_online: Option<Handler>,
    on_offline: Option<Handler>,
}

impl ConnectionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_online(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_online = Some(Arc::new(f));
        self
    }

    pub fn on_offline(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_offline = Some(Arc::new(f));
        self
    }
}

#[derive(Default)]
pub struct CallbackRegistry {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, ConnectionCallbacks>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<u64, ConnectionCallbacks>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(self: &Arc<Self>, callbacks: ConnectionCallbacks) -> CallbackHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries().insert(id, callbacks);
        CallbackHandle {
            id,
            registry: Arc::downgrade(self),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Run every registered handler for the transition to `online`.
    ///
    /// The lock is not held while handlers run. An entry removed mid-dispatch
    /// is skipped; a panicking handler is logged and the rest still run.
    pub fn dispatch(&self, online: bool) {
        let snapshot: Vec<(u64, Handler)> = self
            .entries()
            .iter()
            .filter_map(|(id, cbs)| {
                let handler = if online { &cbs.on_online } else { &cbs.on_offline };
                handler.clone().map(|h| (*id, h))
            })
            .collect();

        for (id, handler) in snapshot {
            if !self.entries().contains_key(&id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                warn!(callback = id, online, "connection callback panicked");
            }
        }
    }

    fn unregister(&self, id: u64) -> bool {
        self.entries().remove(&id).is_some()
    }
}

/// Returned by [`CallbackRegistry::register`]. Dropping it does not
/// unregister.
#[derive(Debug, Clone)]
pub struct CallbackHandle {
    id: u64,
    registry: Weak<CallbackRegistry>,
}

impl CallbackHandle {
    /// Returns `false` if already unregistered or the registry is gone.
    pub fn unregister(&self) -> bool {
        self.registry
            .upgrade()
            .map(|r| r.unregister(self.id))
            .unwrap_or(false)
    }
}
