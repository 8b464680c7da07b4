//! Presence error type and the single noise-filtering policy.
//!
//! Every component catches its own failures and hands them to [`report`],
//! which decides how loudly to log based on [`classify`]. Nothing in the
//! core propagates an error into the aggregator.

use std::time::Duration;

use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("channel disconnected")]
    Disconnected,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("component closed")]
    Closed,
}

impl From<serde_json::Error> for PresenceError {
    fn from(e: serde_json::Error) -> Self {
        PresenceError::Decode(e.to_string())
    }
}

/// How an error should affect logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Short-lived network or channel trouble; retried naturally.
    Transient,
    /// Authorization failure, usually a read or write racing a sign-out.
    Permission,
    /// Anything else.
    Unknown,
}

/// Classify an error. Remote messages are matched by content because the
/// channel reports permission failures as free-form strings.
pub fn classify(err: &PresenceError) -> ErrorClass {
    match err {
        PresenceError::PermissionDenied(_) => ErrorClass::Permission,
        PresenceError::Remote(msg) | PresenceError::Transport(msg) if mentions_permission(msg) => {
            ErrorClass::Permission
        }
        PresenceError::Timeout(_) | PresenceError::Disconnected | PresenceError::Closed => {
            ErrorClass::Transient
        }
        PresenceError::Transport(_) => ErrorClass::Transient,
        PresenceError::Remote(_) | PresenceError::Decode(_) => ErrorClass::Unknown,
    }
}

pub(crate) fn mentions_permission(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("permission") || lower.contains("unauthorized")
}

/// Log an error according to its class and return the class.
pub fn report(context: &str, err: &PresenceError) -> ErrorClass {
    let class = classify(err);
    match class {
        ErrorClass::Permission => debug!(context, error = %err, "presence permission error ignored"),
        ErrorClass::Transient => info!(context, error = %err, "transient presence error"),
        ErrorClass::Unknown => warn!(context, error = %err, "presence error"),
    }
    class
}
