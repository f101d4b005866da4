//! Digital access token models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::publication::PublicationSummary;

/// Database row for `digital_access_tokens`, minted when a purchase is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DigitalAccessToken {
    pub id: i64,
    pub user_id: i64,
    pub publication_id: i64,
    pub token: String,
    pub access_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DigitalAccessToken {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// A digital token with its publication, for the user's token listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalTokenView {
    #[serde(flatten)]
    pub token: DigitalAccessToken,
    pub publication: PublicationSummary,
}

/// Database row for `access_tokens`, the short-lived reader token issued
/// on demand to privileged users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub id: i64,
    pub user_id: i64,
    pub publication_id: i64,
    pub token: String,
    pub permissions: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Fields required to mint (or replace) an access token.
#[derive(Debug, Clone)]
pub struct NewAccessToken {
    pub user_id: i64,
    pub publication_id: i64,
    pub token: String,
    pub permissions: Vec<String>,
    pub expires_at: DateTime<Utc>,
}
