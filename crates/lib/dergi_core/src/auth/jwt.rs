//! Session token signing and verification.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;

use super::AuthError;
use crate::models::auth::SessionClaims;

/// Session lifetime: 7 days.
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Sign a session token (HS256) carrying the user id and role names.
pub fn sign_session(user_id: i64, roles: &[String], secret: &[u8]) -> Result<String, AuthError> {
    sign_session_at(user_id, roles, secret, Utc::now())
}

/// Sign a session token as if issued at `now`.
pub fn sign_session_at(
    user_id: i64,
    roles: &[String],
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let claims = SessionClaims {
        uid: user_id,
        roles: roles.to_vec(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(SESSION_TTL_SECS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
}

/// Verify a session token, returning the claims on success.
///
/// Malformed, expired and badly signed tokens all yield `None`.
pub fn verify_session(token: &str, secret: &[u8]) -> Option<SessionClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;
    decode::<SessionClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Resolve the signing secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new session signing secret");
    secret
}

/// Path to the persisted signing secret.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dergi")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn sign_then_verify_round_trips_claims() {
        let roles = vec!["admin".to_string(), "member".to_string()];
        let token = sign_session(42, &roles, SECRET).unwrap();
        let claims = verify_session(&token, SECRET).expect("valid token");
        assert_eq!(claims.uid, 42);
        assert_eq!(claims.roles, roles);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECS);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_session(1, &[], SECRET).unwrap();
        assert!(verify_session(&token, b"other-secret").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - Duration::days(8);
        let token = sign_session_at(1, &[], SECRET, issued).unwrap();
        assert!(verify_session(&token, SECRET).is_none());
    }

    #[test]
    fn token_still_valid_within_seven_days() {
        let issued = Utc::now() - Duration::days(6);
        let token = sign_session_at(1, &[], SECRET, issued).unwrap();
        assert!(verify_session(&token, SECRET).is_some());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_session("invalid.token.here", SECRET).is_none());
        assert!(verify_session("", SECRET).is_none());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let forged = sign_session(2, &["admin".to_string()], b"attacker").unwrap();
        let forged_payload = forged.split('.').nth(1).unwrap();
        let token = sign_session(1, &["member".to_string()], SECRET).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged_payload;
        assert!(verify_session(&parts.join("."), SECRET).is_none());
    }
}
