//! Session middleware: cookie extraction, JWT verification and the admin gate.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::warn;

use dergi_core::auth::capability::{Capability, has_capability};
use dergi_core::auth::jwt::verify_session;
use dergi_core::models::auth::SessionClaims;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::SESSION_COOKIE;

/// Key used to store the verified session in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionClaims);

impl AuthenticatedUser {
    pub fn user_id(&self) -> i64 {
        self.0.uid
    }

    pub fn roles(&self) -> &[String] {
        &self.0.roles
    }
}

/// Fail with 403 unless `roles` grant `capability`.
pub fn ensure_capability(roles: &[String], capability: Capability) -> Result<(), AppError> {
    if has_capability(roles, capability) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Forbidden".into()))
    }
}

/// Axum middleware: reads the `session` cookie, verifies the JWT and injects
/// `AuthenticatedUser` into request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".into()))?;

    let claims = verify_session(&token, state.config.jwt_secret.as_bytes())
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".into()))?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// Axum middleware for admin routes. Runs after [`require_session`].
///
/// Roles are re-read from the store so revocations apply before the session
/// expires. The refreshed role list replaces the one from the token.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = request
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".into()))?;
    let user_id = session.user_id();

    if state.store.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    let roles = state.store.user_roles(user_id).await?;
    if let Err(e) = ensure_capability(&roles, Capability::Administer) {
        warn!(user_id, "admin route refused");
        return Err(e);
    }

    request.extensions_mut().insert(AuthenticatedUser(SessionClaims {
        roles,
        ..session.0
    }));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_gate() {
        assert!(ensure_capability(&["owner".to_string()], Capability::Administer).is_ok());
        let err = ensure_capability(&["member".to_string()], Capability::Administer).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(ensure_capability(&[], Capability::Administer).is_err());
    }
}
