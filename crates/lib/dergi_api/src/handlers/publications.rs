//! Publication catalogue and access resolution.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;

use dergi_core::access::resolve_access;
use dergi_core::models::publication::PublicationSummary;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ApiPath;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{AccessPublication, AccessResponse, PublicationListResponse};

/// `GET /api/publications`: public publications, newest first.
pub async fn list_publications_handler(
    State(state): State<AppState>,
) -> AppResult<Json<PublicationListResponse>> {
    let publications = state
        .store
        .list_public_publications()
        .await?
        .iter()
        .map(|p| p.summary())
        .collect();
    Ok(Json(PublicationListResponse {
        success: true,
        publications,
    }))
}

/// `GET /api/publications/{id}`
pub async fn get_publication_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<PublicationSummary>> {
    let publication = state
        .store
        .get_publication(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Publication not found".into()))?;
    Ok(Json(publication.summary()))
}

/// `POST /api/publications/{id}/access`: resolve the caller's access tier.
pub async fn access_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<AccessResponse>> {
    let resolution = resolve_access(state.store.as_ref(), user.user_id(), id, Utc::now()).await?;

    Ok(Json(AccessResponse {
        success: true,
        access: resolution.has_access(),
        access_type: resolution.tier.as_str().to_string(),
        publication: AccessPublication {
            id: resolution.publication.id,
            title: resolution.publication.title.clone(),
            publication_type: resolution.publication.publication_type,
            file_key: resolution.file_key().map(String::from),
            token: resolution.token.as_ref().map(|t| t.token.clone()),
        },
        user_roles: resolution.roles,
    }))
}
