//! Token minting.
//!
//! Two token families exist. Digital tokens (`DIGI-<uuid>`) are the purchase
//! entitlement minted on approval. Reader tokens (`admin_<publication>_<ms>`)
//! are short-lived and issued on demand to privileged users.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Validity of a digital token and the grant created alongside it.
pub const DIGITAL_ACCESS_DAYS: i64 = 365;

/// Validity of an on-demand reader token.
pub const READER_TOKEN_HOURS: i64 = 24;

/// Access type stored on digital tokens.
pub const DIGITAL_TOKEN_ACCESS_TYPE: &str = "full";

/// Access type stored on grants created by approval.
pub const PURCHASE_GRANT_ACCESS_TYPE: &str = "read";

/// Permissions carried by reader tokens.
pub const READER_TOKEN_PERMISSIONS: [&str; 3] = ["read", "download", "admin"];

/// Mint a purchase entitlement token.
pub fn mint_digital_token() -> String {
    format!("DIGI-{}", Uuid::new_v4())
}

/// Mint a reader token for `publication_id`.
pub fn mint_reader_token(publication_id: i64, now: DateTime<Utc>) -> String {
    format!("admin_{publication_id}_{}", now.timestamp_millis())
}

pub fn digital_access_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(DIGITAL_ACCESS_DAYS)
}

pub fn reader_token_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(READER_TOKEN_HOURS)
}

pub fn reader_token_permissions() -> Vec<String> {
    READER_TOKEN_PERMISSIONS.iter().map(|p| p.to_string()).collect()
}
