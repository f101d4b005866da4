//! Authentication service: login, registration and the current-user lookup.

use tracing::info;

use dergi_core::auth::jwt::sign_session;
use dergi_core::auth::password::{hash_password, verify_password};
use dergi_core::models::auth::NewUser;
use dergi_core::store::Store;

use crate::error::{AppError, AppResult};
use crate::models::SessionUser;

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LEN: usize = 6;

/// Role granted to newly registered users, when it exists.
const DEFAULT_ROLE: &str = "member";

/// A signed-in user and their fresh session token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: SessionUser,
    pub token: String,
}

/// Authenticate with email + password.
///
/// Unknown emails and wrong passwords produce the same error.
pub async fn login(
    store: &dyn Store,
    email: &str,
    password: &str,
    jwt_secret: &[u8],
) -> AppResult<Session> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation("Email and password are required".into()));
    }

    let Some(found) = store.find_user_by_email(email).await? else {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };
    if !verify_password(password, &found.password_hash)? {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let roles = store.user_roles(found.user.id).await?;
    let token = sign_session(found.user.id, &roles, jwt_secret)?;
    info!(user_id = found.user.id, "user logged in");

    Ok(Session {
        user: SessionUser {
            id: found.user.id,
            email: found.user.email,
            name: found.user.name,
            roles,
        },
        token,
    })
}

/// Register a new account and sign it in.
pub async fn register(
    store: &dyn Store,
    email: &str,
    password: &str,
    name: Option<&str>,
    jwt_secret: &[u8],
) -> AppResult<Session> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    // The default role is optional reference data; without it the account
    // starts with no roles.
    let default_role = store.find_role_by_name(DEFAULT_ROLE).await?;
    let role_ids: Vec<i64> = default_role.iter().map(|r| r.id).collect();
    let user = store
        .create_user_with_roles(
            NewUser {
                email: email.to_string(),
                name: name.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
                password_hash: hash_password(password)?,
                bio: None,
            },
            &role_ids,
        )
        .await?;
    let roles: Vec<String> = default_role.into_iter().map(|r| r.name).collect();

    let token = sign_session(user.id, &roles, jwt_secret)?;
    info!(user_id = user.id, "user registered");

    Ok(Session {
        user: SessionUser {
            id: user.id,
            email: user.email,
            name: user.name,
            roles,
        },
        token,
    })
}

/// The current user with roles read from the store.
pub async fn me(store: &dyn Store, user_id: i64) -> AppResult<SessionUser> {
    let user = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let roles = store.user_roles(user_id).await?;
    Ok(SessionUser {
        id: user.id,
        email: user.email,
        name: user.name,
        roles,
    })
}
