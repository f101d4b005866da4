//! The caller's own purchases and tokens.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;

use dergi_core::models::purchase::PurchaseView;
use dergi_core::models::token::DigitalTokenView;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;

/// `GET /api/user/purchase-requests`
pub async fn purchase_requests_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Vec<PurchaseView>>> {
    let requests = state.store.list_purchases_for_user(user.user_id()).await?;
    Ok(Json(requests))
}

/// `GET /api/user/digital-tokens`: active, unexpired tokens only.
pub async fn digital_tokens_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Vec<DigitalTokenView>>> {
    let tokens = state
        .store
        .list_active_digital_tokens(user.user_id(), Utc::now())
        .await?;
    Ok(Json(tokens))
}
