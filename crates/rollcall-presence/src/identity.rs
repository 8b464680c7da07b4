use serde::{Deserialize, Serialize};

/// The signed-in user as reported by the identity provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    /// Session token handed to the realtime channel.
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Identity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let id = Identity::new("u1", "Dana").with_access_token("secret-jwt");
        let dbg = format!("{id:?}");
        assert!(dbg.contains("u1"));
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("secret-jwt"));
    }

    #[test]
    fn token_is_not_serialized() {
        let id = Identity::new("u1", "Dana").with_access_token("secret-jwt");
        let json = serde_json::to_string(&id).unwrap();
        assert!(!json.contains("secret-jwt"));
        assert!(!json.contains("access_token"));
    }
}
