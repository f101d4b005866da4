//! Purchase request handlers.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;

use dergi_core::models::purchase::{ApprovalOutcome, PurchaseRequest};
use dergi_core::purchase::{self, PurchaseInput};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CreatePurchaseRequest, PurchaseDecisionRequest};

/// `POST /api/purchase/create`
pub async fn create_purchase_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<CreatePurchaseRequest>,
) -> AppResult<Json<PurchaseRequest>> {
    let request = purchase::create_request(
        state.store.as_ref(),
        user.user_id(),
        PurchaseInput {
            publication_id: body.publication_id,
            payment_method: body.payment_method,
            amount: body.amount,
            notes: body.notes,
        },
        Utc::now(),
    )
    .await?;
    Ok(Json(request))
}

/// `POST /api/admin/approve-purchase`
pub async fn approve_purchase_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<PurchaseDecisionRequest>,
) -> AppResult<Json<ApprovalOutcome>> {
    let purchase_id = required_purchase_id(&body)?;
    let outcome =
        purchase::approve(state.store.as_ref(), purchase_id, admin.user_id(), Utc::now()).await?;
    Ok(Json(outcome))
}

/// `POST /api/admin/reject-purchase`
pub async fn reject_purchase_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<PurchaseDecisionRequest>,
) -> AppResult<Json<PurchaseRequest>> {
    let purchase_id = required_purchase_id(&body)?;
    let updated =
        purchase::reject(state.store.as_ref(), purchase_id, admin.user_id(), Utc::now()).await?;
    Ok(Json(updated))
}

fn required_purchase_id(body: &PurchaseDecisionRequest) -> AppResult<i64> {
    body.purchase_id
        .ok_or_else(|| AppError::Validation("Missing purchaseId".into()))
}
