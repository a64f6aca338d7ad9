use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

// Accepts "In Progress", "in-progress", "IN_PROGRESS" alike.
fn normalize_label(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClientStatus {
    #[default]
    #[serde(rename = "In Progress")]
    InProgress,
    Blocked,
    Completed,
}

impl ClientStatus {
    pub const ALL: [ClientStatus; 3] = [
        ClientStatus::InProgress,
        ClientStatus::Blocked,
        ClientStatus::Completed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ClientStatus::InProgress => "In Progress",
            ClientStatus::Blocked => "Blocked",
            ClientStatus::Completed => "Completed",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ClientStatus::InProgress => ClientStatus::Blocked,
            ClientStatus::Blocked => ClientStatus::Completed,
            ClientStatus::Completed => ClientStatus::InProgress,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            ClientStatus::InProgress => ClientStatus::Completed,
            ClientStatus::Blocked => ClientStatus::InProgress,
            ClientStatus::Completed => ClientStatus::Blocked,
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ClientStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_label(s);
        Self::ALL
            .into_iter()
            .find(|status| normalize_label(status.label()) == wanted)
            .ok_or_else(|| ParseLabelError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// Position in the four-step onboarding funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum OnboardingStage {
    #[default]
    Docs,
    Setup,
    Testing,
    Live,
}

impl OnboardingStage {
    pub const ALL: [OnboardingStage; 4] = [
        OnboardingStage::Docs,
        OnboardingStage::Setup,
        OnboardingStage::Testing,
        OnboardingStage::Live,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OnboardingStage::Docs => "Docs",
            OnboardingStage::Setup => "Setup",
            OnboardingStage::Testing => "Testing",
            OnboardingStage::Live => "Live",
        }
    }

    /// Moves one step forward, staying on `Live`.
    pub fn next(self) -> Self {
        match self {
            OnboardingStage::Docs => OnboardingStage::Setup,
            OnboardingStage::Setup => OnboardingStage::Testing,
            OnboardingStage::Testing | OnboardingStage::Live => OnboardingStage::Live,
        }
    }

    /// Moves one step back, staying on `Docs`.
    pub fn previous(self) -> Self {
        match self {
            OnboardingStage::Docs | OnboardingStage::Setup => OnboardingStage::Docs,
            OnboardingStage::Testing => OnboardingStage::Setup,
            OnboardingStage::Live => OnboardingStage::Testing,
        }
    }
}

impl fmt::Display for OnboardingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OnboardingStage {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_label(s);
        Self::ALL
            .into_iter()
            .find(|stage| normalize_label(stage.label()) == wanted)
            .ok_or_else(|| ParseLabelError {
                kind: "onboarding stage",
                value: s.to_string(),
            })
    }
}

// Older rows carry a null stage; they read as the first funnel step.
fn null_stage_as_docs<'de, D>(deserializer: D) -> Result<OnboardingStage, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OnboardingStage>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: ClientStatus,
    #[serde(default, deserialize_with = "null_stage_as_docs")]
    pub onboarding_stage: OnboardingStage,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn phone_or_placeholder(&self) -> &str {
        self.phone.as_deref().filter(|p| !p.is_empty()).unwrap_or("--")
    }

    /// First eight characters of the id, as shown next to the name.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

/// What the add-client form collects, before an owner is attached.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientDraft {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: ClientStatus,
    pub onboarding_stage: OnboardingStage,
}

impl ClientDraft {
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }

    pub fn owned_by(self, user_id: Uuid) -> NewClient {
        NewClient {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            status: self.status,
            onboarding_stage: self.onboarding_stage,
            user_id,
        }
    }
}

/// Row sent on insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewClient {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: ClientStatus,
    pub onboarding_stage: OnboardingStage,
    pub user_id: Uuid,
}

/// Per-field update; only the fields that are set go over the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ClientPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClientStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_stage: Option<OnboardingStage>,
}

impl ClientPatch {
    pub fn status(status: ClientStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn stage(stage: OnboardingStage) -> Self {
        Self {
            onboarding_stage: Some(stage),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, client: &mut Client) {
        if let Some(status) = self.status {
            client.status = status;
        }
        if let Some(stage) = self.onboarding_stage {
            client.onboarding_stage = stage;
        }
    }
}
