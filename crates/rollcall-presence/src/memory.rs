//! In-process implementations of the collaborator traits.
//!
//! [`MemoryStore`] behaves like a realtime channel with a flat key-path tree:
//! it resolves server timestamps, rejects writes while disconnected, and
//! fires write-on-disconnect registrations when the connection drops.
//! [`ManualReachability`] is a reachability signal driven by hand.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};

use crate::error::PresenceError;
use crate::protocol::{is_server_timestamp, PresenceRecord, CONNECTED_PATH};
use crate::store::{Reachability, RealtimeStore};

/// Kind of write recorded by [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Set,
    Update,
    OnDisconnect,
    /// A registration fired by the server side after a drop.
    DisconnectFired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub kind: WriteKind,
    pub path: String,
    pub value: Value,
}

#[derive(Default)]
struct MemoryInner {
    tree: BTreeMap<String, Value>,
    on_disconnect: Vec<(String, Value)>,
    log: Vec<WriteOp>,
    failures: HashMap<String, PresenceError>,
    probe: Option<Result<bool, PresenceError>>,
    reads: usize,
}

pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    connected: watch::Sender<bool>,
    hang_probe: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            inner: Mutex::new(MemoryInner::default()),
            connected,
            hang_probe: AtomicBool::new(false),
            read_delay: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Flip the connection flag. Dropping the connection runs and clears the
    /// pending write-on-disconnect registrations.
    pub fn set_connected(&self, connected: bool) {
        if !connected && self.is_connected() {
            let mut inner = self.lock();
            let fired: Vec<(String, Value)> = inner.on_disconnect.drain(..).collect();
            for (path, value) in fired {
                let value = resolve_timestamps(value);
                inner.tree.insert(path.clone(), value.clone());
                inner.log.push(WriteOp {
                    kind: WriteKind::DisconnectFired,
                    path,
                    value,
                });
            }
        }
        self.connected.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
    }

    /// Seed a value as if written by another client.
    pub fn insert(&self, path: &str, value: Value) {
        self.lock().tree.insert(path.to_string(), resolve_timestamps(value));
    }

    pub fn value(&self, path: &str) -> Option<Value> {
        self.lock().tree.get(path).cloned()
    }

    pub fn record(&self, path: &str) -> Option<PresenceRecord> {
        self.value(path)
            .and_then(|v| PresenceRecord::from_value(v).ok())
    }

    /// Make every read and write of `path` fail with `err`.
    pub fn fail_path(&self, path: &str, err: PresenceError) {
        self.lock().failures.insert(path.to_string(), err);
    }

    pub fn clear_failure(&self, path: &str) {
        self.lock().failures.remove(path);
    }

    /// Override the result of [`RealtimeStore::probe_connection`].
    pub fn set_probe(&self, result: Option<Result<bool, PresenceError>>) {
        self.lock().probe = result;
    }

    /// Make probes never complete.
    pub fn hang_probe(&self, hang: bool) {
        self.hang_probe.store(hang, Ordering::SeqCst);
    }

    /// Delay every read by `delay` before it touches the tree.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn writes(&self) -> Vec<WriteOp> {
        self.lock().log.clone()
    }

    pub fn count_writes(&self, kind: WriteKind, path: &str) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|w| w.kind == kind && w.path == path)
            .count()
    }

    pub fn pending_disconnect_writes(&self) -> usize {
        self.lock().on_disconnect.len()
    }

    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    fn check(&self, inner: &MemoryInner, path: &str) -> Result<(), PresenceError> {
        if let Some(err) = inner.failures.get(path) {
            return Err(err.clone());
        }
        if !self.is_connected() {
            return Err(PresenceError::Disconnected);
        }
        Ok(())
    }

    fn check_write(&self, inner: &MemoryInner, path: &str) -> Result<(), PresenceError> {
        if path == CONNECTED_PATH {
            return Err(PresenceError::PermissionDenied(path.to_string()));
        }
        self.check(inner, path)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    fn connection_flag(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    async fn probe_connection(&self) -> Result<bool, PresenceError> {
        if self.hang_probe.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let inner = self.lock();
        match &inner.probe {
            Some(result) => result.clone(),
            None => Ok(self.is_connected()),
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, PresenceError> {
        let delay = *self.read_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if path == CONNECTED_PATH {
            return Ok(Some(Value::Bool(self.is_connected())));
        }
        let mut inner = self.lock();
        self.check(&inner, path)?;
        inner.reads += 1;

        if let Some(value) = inner.tree.get(path) {
            return Ok(Some(value.clone()));
        }

        // Direct children only: "status" lists "status/<id>" entries.
        let prefix = format!("{path}/");
        let children: Map<String, Value> = inner
            .tree
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, v)| {
                let child = &k[prefix.len()..];
                (!child.contains('/')).then(|| (child.to_string(), v.clone()))
            })
            .collect();

        Ok((!children.is_empty()).then_some(Value::Object(children)))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), PresenceError> {
        let mut inner = self.lock();
        self.check_write(&inner, path)?;
        let value = resolve_timestamps(value);
        inner.tree.insert(path.to_string(), value.clone());
        inner.log.push(WriteOp {
            kind: WriteKind::Set,
            path: path.to_string(),
            value,
        });
        Ok(())
    }

    async fn update(&self, path: &str, fields: Value) -> Result<(), PresenceError> {
        let mut inner = self.lock();
        self.check_write(&inner, path)?;
        let fields = resolve_timestamps(fields);
        let Value::Object(new_fields) = fields.clone() else {
            return Err(PresenceError::Decode("update payload must be an object".into()));
        };

        let entry = inner
            .tree
            .entry(path.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(existing) = entry {
            existing.extend(new_fields);
        } else {
            *entry = Value::Object(new_fields);
        }

        inner.log.push(WriteOp {
            kind: WriteKind::Update,
            path: path.to_string(),
            value: fields,
        });
        Ok(())
    }

    async fn on_disconnect_set(&self, path: &str, value: Value) -> Result<(), PresenceError> {
        let mut inner = self.lock();
        self.check_write(&inner, path)?;
        inner.on_disconnect.push((path.to_string(), value.clone()));
        inner.log.push(WriteOp {
            kind: WriteKind::OnDisconnect,
            path: path.to_string(),
            value,
        });
        Ok(())
    }
}

fn resolve_timestamps(value: Value) -> Value {
    match value {
        v if is_server_timestamp(&v) => Value::from(chrono::Utc::now().timestamp_millis()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, resolve_timestamps(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Reachability signal set by hand.
pub struct ManualReachability {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Result<bool, PresenceError>>>>,
    last: AtomicBool,
    probe: Mutex<Option<Result<bool, PresenceError>>>,
    hang: AtomicBool,
}

impl ManualReachability {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            last: AtomicBool::new(false),
            probe: Mutex::new(None),
            hang: AtomicBool::new(false),
        }
    }

    fn emit(&self, reading: Result<bool, PresenceError>) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| tx.send(reading.clone()).is_ok());
    }

    pub fn set(&self, reachable: bool) {
        self.last.store(reachable, Ordering::SeqCst);
        self.emit(Ok(reachable));
    }

    /// Emit a failed reading.
    pub fn fail(&self, err: PresenceError) {
        self.last.store(false, Ordering::SeqCst);
        self.emit(Err(err));
    }

    /// Override what [`Reachability::probe`] returns. By default it reports
    /// the last value passed to [`ManualReachability::set`].
    pub fn set_probe(&self, result: Result<bool, PresenceError>) {
        *self.probe.lock().unwrap_or_else(|e| e.into_inner()) = Some(result);
    }

    pub fn hang_probe(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }
}

impl Default for ManualReachability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reachability for ManualReachability {
    fn readings(&self) -> mpsc::UnboundedReceiver<Result<bool, PresenceError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    async fn probe(&self) -> Result<bool, PresenceError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let over = self.probe.lock().unwrap_or_else(|e| e.into_inner()).clone();
        over.unwrap_or_else(|| Ok(self.last.load(Ordering::SeqCst)))
    }
}
