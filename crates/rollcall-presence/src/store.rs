//! Contracts for the external collaborators the core depends on.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::error::PresenceError;

/// Remote realtime channel: key-path reads and writes, the connection flag,
/// and server-side write-on-disconnect registration.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Subscription to the channel's own "connected" flag.
    fn connection_flag(&self) -> watch::Receiver<bool>;

    /// Ask the channel directly whether it is connected, bypassing any cache.
    async fn probe_connection(&self) -> Result<bool, PresenceError>;

    async fn get(&self, path: &str) -> Result<Option<Value>, PresenceError>;

    /// Overwrite the value at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<(), PresenceError>;

    /// Merge the fields of `fields` into the object at `path`.
    async fn update(&self, path: &str, fields: Value) -> Result<(), PresenceError>;

    /// Register `value` to be written at `path` by the server when this
    /// channel session drops. Registrations do not survive a reconnect.
    async fn on_disconnect_set(&self, path: &str, value: Value) -> Result<(), PresenceError>;
}

/// Device network-path reachability.
#[async_trait]
pub trait Reachability: Send + Sync {
    /// Open a new subscription of raw readings. Dropping the receiver ends it.
    fn readings(&self) -> mpsc::UnboundedReceiver<Result<bool, PresenceError>>;

    /// Check reachability now instead of waiting for the next reading.
    async fn probe(&self) -> Result<bool, PresenceError>;
}
