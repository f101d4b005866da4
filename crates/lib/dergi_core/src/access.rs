//! Publication access resolution.
//!
//! First match wins: privileged caller, then an unexpired grant, then a
//! public publication. Anything else has no access.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::auth::capability::{Capability, has_capability};
use crate::error::DomainError;
use crate::models::publication::{Publication, PublicationAccess};
use crate::models::token::{AccessToken, NewAccessToken};
use crate::store::Store;
use crate::tokens::{mint_reader_token, reader_token_expiry, reader_token_permissions};

/// How a user reaches a publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTier {
    Admin,
    /// Carries the grant's access type.
    Granted(String),
    Public,
    None,
}

impl AccessTier {
    pub fn as_str(&self) -> &str {
        match self {
            AccessTier::Admin => "admin",
            AccessTier::Granted(kind) => kind,
            AccessTier::Public => "public",
            AccessTier::None => "none",
        }
    }

    pub fn has_access(&self) -> bool {
        !matches!(self, AccessTier::None)
    }
}

/// Pick the tier for a caller.
pub fn decide_tier(
    privileged: bool,
    grant: Option<&PublicationAccess>,
    publication: &Publication,
    now: DateTime<Utc>,
) -> AccessTier {
    if privileged {
        return AccessTier::Admin;
    }
    if let Some(grant) = grant
        && grant.is_active(now)
    {
        return AccessTier::Granted(grant.access_type.clone());
    }
    if publication.is_public {
        return AccessTier::Public;
    }
    AccessTier::None
}

#[derive(Debug, Clone)]
pub struct AccessResolution {
    pub publication: Publication,
    pub tier: AccessTier,
    /// Reader token, only for the admin tier.
    pub token: Option<AccessToken>,
    pub roles: Vec<String>,
}

impl AccessResolution {
    pub fn has_access(&self) -> bool {
        self.tier.has_access()
    }

    /// The content key, revealed only when access is granted.
    pub fn file_key(&self) -> Option<&str> {
        self.has_access().then_some(self.publication.file_key.as_str())
    }
}

/// Resolve `user_id`'s access to `publication_id`.
///
/// Roles are read from the store. Privileged callers get a reader token for
/// the pair; an existing one is reused until it expires.
pub async fn resolve_access(
    store: &dyn Store,
    user_id: i64,
    publication_id: i64,
    now: DateTime<Utc>,
) -> Result<AccessResolution, DomainError> {
    if store.get_user(user_id).await?.is_none() {
        return Err(DomainError::NotFound("User not found".into()));
    }
    let publication = store
        .get_publication(publication_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("Publication not found".into()))?;

    let roles = store.user_roles(user_id).await?;
    let privileged = has_capability(&roles, Capability::Administer);

    let grant = if privileged {
        None
    } else {
        store.find_access(user_id, publication_id).await?
    };
    let tier = decide_tier(privileged, grant.as_ref(), &publication, now);

    let token = if tier == AccessTier::Admin {
        Some(reader_token(store, user_id, publication_id, now).await?)
    } else {
        None
    };

    debug!(user_id, publication_id, tier = tier.as_str(), "access resolved");
    Ok(AccessResolution {
        publication,
        tier,
        token,
        roles,
    })
}

async fn reader_token(
    store: &dyn Store,
    user_id: i64,
    publication_id: i64,
    now: DateTime<Utc>,
) -> Result<AccessToken, DomainError> {
    if let Some(existing) = store.find_access_token(user_id, publication_id).await?
        && !existing.is_expired(now)
    {
        return Ok(existing);
    }
    let token = store
        .put_access_token(NewAccessToken {
            user_id,
            publication_id,
            token: mint_reader_token(publication_id, now),
            permissions: reader_token_permissions(),
            expires_at: reader_token_expiry(now),
        })
        .await?;
    debug!(user_id, publication_id, "reader token minted");
    Ok(token)
}
