//! Presence record format and key paths.
//!
//! One record per user lives at `<status_root>/<user_id>` and holds
//! `{ "state": ..., "last_active": ... }`. `last_active` is assigned by the
//! server: writers send the [`server_timestamp`] placeholder and the store
//! replaces it with epoch milliseconds.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default key-path root for presence records.
pub const STATUS_ROOT: &str = "status";

/// Well-known path the channel maintains itself; not writable by the app.
pub const CONNECTED_PATH: &str = ".info/connected";

/// Path of one user's presence record.
pub fn status_path(root: &str, user_id: &str) -> String {
    format!("{root}/{user_id}")
}

/// Placeholder resolved to the server clock on write.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

/// Whether a value is the [`server_timestamp`] placeholder.
pub fn is_server_timestamp(value: &Value) -> bool {
    value.get(".sv").and_then(Value::as_str) == Some("timestamp")
}

/// Remote presence state. Anything other than `online` means "not online";
/// `background` and `inactive` tell observers the device is still present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    Online,
    Offline,
    Background,
    Inactive,
}

impl PresenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::Online => "online",
            PresenceState::Offline => "offline",
            PresenceState::Background => "background",
            PresenceState::Inactive => "inactive",
        }
    }
}

/// A presence record as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub state: PresenceState,
    /// Epoch millis; absent when the server has not resolved the write yet.
    #[serde(default, deserialize_with = "de_last_active")]
    pub last_active: Option<i64>,
}

impl PresenceRecord {
    pub fn is_online(&self) -> bool {
        self.state == PresenceState::Online
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

fn de_last_active<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Unresolved placeholders and non-integer values read as "unknown".
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

/// Full record payload with a server-assigned timestamp.
pub fn record_payload(state: PresenceState) -> Value {
    json!({
        "state": state,
        "last_active": server_timestamp(),
    })
}

/// Partial update that refreshes `last_active` without touching `state`.
pub fn heartbeat_payload() -> Value {
    json!({ "last_active": server_timestamp() })
}

/// Local app lifecycle as reported by the host platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    #[default]
    Active,
    Background,
    Inactive,
}

impl AppState {
    pub fn is_foreground(&self) -> bool {
        matches!(self, AppState::Active)
    }

    /// State written to the remote record while the channel is connected.
    pub fn remote_state(&self) -> PresenceState {
        match self {
            AppState::Active => PresenceState::Online,
            AppState::Background => PresenceState::Background,
            AppState::Inactive => PresenceState::Inactive,
        }
    }
}

impl std::str::FromStr for AppState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AppState::Active),
            "background" => Ok(AppState::Background),
            "inactive" => Ok(AppState::Inactive),
            other => Err(format!("unknown app state: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_path_joins_root_and_user() {
        assert_eq!(status_path("status", "u42"), "status/u42");
    }

    #[test]
    fn record_payload_uses_server_timestamp() {
        let payload = record_payload(PresenceState::Offline);
        assert_eq!(payload["state"], "offline");
        assert!(is_server_timestamp(&payload["last_active"]));
    }

    #[test]
    fn heartbeat_payload_leaves_state_alone() {
        let payload = heartbeat_payload();
        assert!(payload.get("state").is_none());
        assert!(is_server_timestamp(&payload["last_active"]));
    }

    #[test]
    fn record_parses_resolved_timestamp() {
        let record =
            PresenceRecord::from_value(json!({"state": "online", "last_active": 1700000000000i64}))
                .unwrap();
        assert!(record.is_online());
        assert_eq!(record.last_active, Some(1_700_000_000_000));
    }

    #[test]
    fn record_tolerates_unresolved_or_missing_timestamp() {
        let record =
            PresenceRecord::from_value(json!({"state": "background", "last_active": {".sv": "timestamp"}}))
                .unwrap();
        assert_eq!(record.state, PresenceState::Background);
        assert_eq!(record.last_active, None);

        let record = PresenceRecord::from_value(json!({"state": "offline"})).unwrap();
        assert_eq!(record.last_active, None);
        assert!(!record.is_online());
    }

    #[test]
    fn record_rejects_unknown_state() {
        assert!(PresenceRecord::from_value(json!({"state": "busy"})).is_err());
    }

    #[test]
    fn app_state_parses_platform_strings() {
        assert_eq!("active".parse::<AppState>().unwrap(), AppState::Active);
        assert_eq!("background".parse::<AppState>().unwrap(), AppState::Background);
        assert_eq!("inactive".parse::<AppState>().unwrap(), AppState::Inactive);
        assert!("suspended".parse::<AppState>().is_err());
    }

    #[test]
    fn backgrounded_app_is_not_reported_offline() {
        assert_eq!(AppState::Background.remote_state(), PresenceState::Background);
        assert_eq!(AppState::Inactive.remote_state(), PresenceState::Inactive);
        assert!(!AppState::Background.is_foreground());
        assert!(AppState::Active.is_foreground());
    }
}
