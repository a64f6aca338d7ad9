use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Seconds before `expires_at` at which a token is already treated as stale.
const EXPIRY_LEEWAY_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl User {
    pub fn workspace(&self) -> WorkspaceProfile {
        WorkspaceProfile::from_metadata(&self.user_metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Typed view over the unstructured metadata stored on the user record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkspaceProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub onboarding_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottleneck_focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_volume: Option<String>,
}

impl WorkspaceProfile {
    pub fn from_metadata(metadata: &Map<String, Value>) -> Self {
        let mut profile = WorkspaceProfile::default();
        let text = |key: &str| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        profile.workspace_name = text("workspace_name");
        profile.bottleneck_focus = text("bottleneck_focus");
        profile.client_volume = text("client_volume");
        profile.onboarding_complete = metadata
            .get("onboarding_complete")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        profile
    }

    /// Only the keys that are set; the backend merges them into existing metadata.
    pub fn to_metadata(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.workspace_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Founder")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_expiring_at(expires_at: DateTime<Utc>) -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at,
            user: User {
                id: Uuid::new_v4(),
                email: Some("founder@example.com".into()),
                user_metadata: Map::new(),
            },
        }
    }

    #[test]
    fn session_expires_inside_leeway() {
        let now = Utc::now();
        assert!(session_expiring_at(now + Duration::seconds(30)).is_expired(now));
        assert!(session_expiring_at(now - Duration::seconds(1)).is_expired(now));
        assert!(!session_expiring_at(now + Duration::hours(1)).is_expired(now));
    }

    #[test]
    fn reads_workspace_profile_and_ignores_unknown_keys() {
        let metadata = json!({
            "workspace_name": "Prism Creative",
            "onboarding_complete": true,
            "bottleneck_focus": "Technical Setup",
            "avatar": "ignored"
        });
        let Value::Object(metadata) = metadata else { unreachable!() };

        let profile = WorkspaceProfile::from_metadata(&metadata);
        assert_eq!(profile.workspace_name.as_deref(), Some("Prism Creative"));
        assert!(profile.onboarding_complete);
        assert_eq!(profile.bottleneck_focus.as_deref(), Some("Technical Setup"));
        assert_eq!(profile.client_volume, None);
    }

    #[test]
    fn writes_only_set_keys() {
        let profile = WorkspaceProfile {
            workspace_name: Some("Node".into()),
            onboarding_complete: true,
            ..WorkspaceProfile::default()
        };

        assert_eq!(
            Value::Object(profile.to_metadata()),
            json!({ "workspace_name": "Node", "onboarding_complete": true })
        );
    }

    #[test]
    fn blank_workspace_name_falls_back() {
        assert_eq!(WorkspaceProfile::default().display_name(), "Founder");
        let named = WorkspaceProfile {
            workspace_name: Some("  ".into()),
            ..WorkspaceProfile::default()
        };
        assert_eq!(named.display_name(), "Founder");
    }
}
