use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    #[default]
    Active,
    Revoked,
}

/// An API key issued under an API. Only the hash of the key material is
/// stored; the plaintext is returned once at creation time by the admin
/// layer and never enters the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub api_id: String,
    pub name: String,
    pub key_hash: String,
    #[serde(default)]
    pub status: ApiKeyStatus,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// A key counts towards the distributed state only while active and
    /// unexpired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ApiKeyStatus::Active && self.expires_at.is_none_or(|exp| exp > now)
    }
}
