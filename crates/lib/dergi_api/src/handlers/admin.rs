//! Admin request handlers. Routed behind `require_admin`.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use dergi_core::auth::capability::normalize_role;
use dergi_core::models::auth::{Role, UserRoleAssignment};
use dergi_core::models::publication::{NewAccess, PublicationAccess};
use dergi_core::models::purchase::PurchaseView;
use dergi_core::store::ROLE_ALREADY_ASSIGNED;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{AssignRoleRequest, GrantAccessRequest};

/// `POST /api/admin/assign-role`: accepts `roleId` or `roleName`.
pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<AssignRoleRequest>,
) -> AppResult<Json<UserRoleAssignment>> {
    let role_name = body
        .role_name
        .as_deref()
        .map(normalize_role)
        .filter(|n| !n.is_empty());
    let Some(user_id) = body.user_id else {
        return Err(AppError::Validation("Missing userId or roleId".into()));
    };
    if body.role_id.is_none() && role_name.is_none() {
        return Err(AppError::Validation("Missing userId or roleId".into()));
    }

    if state.store.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    let role = match (body.role_id, role_name) {
        (Some(role_id), _) => state.store.find_role_by_id(role_id).await?,
        (None, Some(name)) => state.store.find_role_by_name(&name).await?,
        (None, None) => None,
    }
    .ok_or_else(|| AppError::NotFound("Role not found".into()))?;

    if state.store.has_role(user_id, role.id).await? {
        return Err(AppError::Conflict(ROLE_ALREADY_ASSIGNED.into()));
    }
    let assignment = state.store.assign_role(user_id, role.id).await?;
    info!(
        user_id,
        role = %assignment.role.name,
        admin_id = admin.user_id(),
        "role assigned"
    );
    Ok(Json(assignment))
}

/// `GET /api/admin/roles`
pub async fn list_roles_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Role>>> {
    Ok(Json(state.store.list_roles().await?))
}

/// `GET /api/admin/purchases`: every request with its user, newest first.
pub async fn list_purchases_handler(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PurchaseView>>> {
    Ok(Json(state.store.list_all_purchases().await?))
}

/// `POST /api/admin/grant-access`: grant or refresh a user's access directly.
pub async fn grant_access_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<GrantAccessRequest>,
) -> AppResult<Json<PublicationAccess>> {
    let (Some(user_id), Some(publication_id)) = (body.user_id, body.publication_id) else {
        return Err(AppError::Validation("Missing userId or publicationId".into()));
    };
    let access_type = body
        .access_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "read".to_string());
    let expires_at = grant_expiry(body.days, Utc::now())?;

    if state.store.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    if state.store.get_publication(publication_id).await?.is_none() {
        return Err(AppError::NotFound("Publication not found".into()));
    }

    let grant = state
        .store
        .grant_access(NewAccess {
            user_id,
            publication_id,
            access_type,
            expires_at,
        })
        .await?;
    info!(
        user_id,
        publication_id,
        access_type = %grant.access_type,
        admin_id = admin.user_id(),
        "access granted"
    );
    Ok(Json(grant))
}

/// Expiry `days` after `now`; `None` means the grant never expires.
fn grant_expiry(days: Option<i64>, now: DateTime<Utc>) -> AppResult<Option<DateTime<Utc>>> {
    let Some(days) = days else {
        return Ok(None);
    };
    if days <= 0 {
        return Err(AppError::Validation("days must be positive".into()));
    }
    Duration::try_days(days)
        .and_then(|d| now.checked_add_signed(d))
        .map(Some)
        .ok_or_else(|| AppError::Validation("days is too large".into()))
}
