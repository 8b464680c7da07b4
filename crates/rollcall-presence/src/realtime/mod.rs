//! WebSocket implementation of [`RealtimeStore`].
//!
//! One background task owns the socket. Requests are JSON text frames
//! `{ref, op, path, payload}` answered by `reply` frames carrying the same
//! ref. Requests made while the socket is down fail with
//! [`PresenceError::Disconnected`] instead of being queued, so a stale
//! write is never replayed after a reconnect.

mod connection;
mod handler;
mod types;


pub use types::{Op, RealtimeClientConfig, ReplyPayload};

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::error::PresenceError;
use crate::store::RealtimeStore;
use connection::{run_connection, Outbound};

pub struct RealtimeClient {
    commands: mpsc::Sender<Outbound>,
    connected: watch::Receiver<bool>,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl RealtimeClient {
    /// Spawn the connection task. Must be called from within a tokio runtime.
    pub fn connect(config: RealtimeClientConfig) -> Self {
        let (commands, command_rx) = mpsc::channel(256);
        let (connected_tx, connected) = watch::channel(false);
        let cancel = CancellationToken::new();
        let request_timeout = config.request_timeout;

        tokio::spawn(run_connection(
            config,
            command_rx,
            connected_tx,
            cancel.clone(),
        ));

        Self {
            commands,
            connected,
            request_timeout,
            cancel,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn request(
        &self,
        op: Op,
        path: Option<&str>,
        payload: Value,
    ) -> Result<Value, PresenceError> {
        if !self.is_connected() {
            return Err(PresenceError::Disconnected);
        }

        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Outbound {
                op,
                path: path.map(str::to_string),
                payload,
                reply,
            })
            .await
            .map_err(|_| PresenceError::Closed)?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PresenceError::Disconnected),
            Err(_) => Err(PresenceError::Timeout(self.request_timeout)),
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl RealtimeStore for RealtimeClient {
    fn connection_flag(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    async fn probe_connection(&self) -> Result<bool, PresenceError> {
        match self.request(Op::Ping, None, Value::Null).await {
            Ok(_) => Ok(true),
            Err(PresenceError::Disconnected) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, PresenceError> {
        let value = self.request(Op::Get, Some(path), Value::Null).await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), PresenceError> {
        self.request(Op::Set, Some(path), value).await.map(|_| ())
    }

    async fn update(&self, path: &str, fields: Value) -> Result<(), PresenceError> {
        self.request(Op::Update, Some(path), fields).await.map(|_| ())
    }

    async fn on_disconnect_set(&self, path: &str, value: Value) -> Result<(), PresenceError> {
        self.request(Op::OnDisconnect, Some(path), value)
            .await
            .map(|_| ())
    }
}
