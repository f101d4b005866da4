//! Publication and access-grant models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication format, matching the `publication_type` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "publication_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PublicationType {
    Magazine,
    MiniSeries,
}

/// Database row for `publications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub publication_type: PublicationType,
    pub issue: Option<String>,
    pub page_count: i32,
    /// Reference to the flipbook file. Only revealed to users with access.
    pub file_key: String,
    pub cover_image: Option<String>,
    pub is_public: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Publication {
    /// Catalogue view without the file reference.
    pub fn summary(&self) -> PublicationSummary {
        PublicationSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            publication_type: self.publication_type,
            issue: self.issue.clone(),
            page_count: self.page_count,
            cover_image: self.cover_image.clone(),
            published_at: self.published_at,
            created_at: self.created_at,
        }
    }
}

/// Public catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub publication_type: PublicationType,
    pub issue: Option<String>,
    pub page_count: i32,
    pub cover_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a publication.
#[derive(Debug, Clone)]
pub struct NewPublication {
    pub title: String,
    pub description: Option<String>,
    pub publication_type: PublicationType,
    pub issue: Option<String>,
    pub page_count: i32,
    pub file_key: String,
    pub cover_image: Option<String>,
    pub is_public: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Database row for `publication_access`: a user's access tier on a publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicationAccess {
    pub id: i64,
    pub user_id: i64,
    pub publication_id: i64,
    /// Tier name, e.g. `read` or `admin`.
    pub access_type: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PublicationAccess {
    /// A grant without expiry never lapses.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// Fields required to grant (or refresh) access.
#[derive(Debug, Clone)]
pub struct NewAccess {
    pub user_id: i64,
    pub publication_id: i64,
    pub access_type: String,
    pub expires_at: Option<DateTime<Utc>>,
}
