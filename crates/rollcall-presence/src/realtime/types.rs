//! Wire frames and client configuration for the realtime channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{mentions_permission, PresenceError};

/// Configuration for [`super::RealtimeClient`].
#[derive(Clone)]
pub struct RealtimeClientConfig {
    pub url: String,
    /// Sent in the `auth` frame right after the socket opens.
    pub access_token: Option<String>,
    pub heartbeat_interval: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for RealtimeClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClientConfig")
            .field("url", &self.url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("max_reconnect_delay", &self.max_reconnect_delay)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl RealtimeClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: None,
            heartbeat_interval: Duration::from_secs(25),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_delay = base;
        self.max_reconnect_delay = max;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Auth,
    Get,
    Set,
    Update,
    OnDisconnect,
    Ping,
    Reply,
}

/// Client-to-server frame.
#[derive(Debug, Serialize)]
pub struct RequestFrame<'a> {
    #[serde(rename = "ref")]
    pub ref_id: u64,
    pub op: Op,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<&'a str>,
    pub payload: &'a Value,
}

/// Server-to-client frame. Only `reply` frames carry a ref the client
/// waits on; other ops are informational.
#[derive(Debug, Deserialize)]
pub struct ServerFrame {
    #[serde(rename = "ref", default)]
    pub ref_id: Option<u64>,
    pub op: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReplyPayload {
    Ok {
        #[serde(default)]
        response: Value,
    },
    Error {
        #[serde(default)]
        reason: String,
    },
}

impl ReplyPayload {
    pub fn into_result(self) -> Result<Value, PresenceError> {
        match self {
            ReplyPayload::Ok { response } => Ok(response),
            ReplyPayload::Error { reason } if mentions_permission(&reason) => {
                Err(PresenceError::PermissionDenied(reason))
            }
            ReplyPayload::Error { reason } => Err(PresenceError::Remote(reason)),
        }
    }
}
