//! Purchase request workflow: create, approve, reject.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::DomainError;
use crate::models::money::to_cents;
use crate::models::purchase::{
    Approval, ApprovalOutcome, Decision, NewPurchaseRequest, PurchaseRequest,
};
use crate::store::{
    ACCESS_EXISTS, PENDING_PURCHASE_EXISTS, PURCHASE_NOT_FOUND, PURCHASE_NOT_PENDING, Store,
    StoreError,
};
use crate::tokens::{digital_access_expiry, mint_digital_token};

pub const DEFAULT_PAYMENT_METHOD: &str = "credit_card";
pub const DEFAULT_NOTES: &str = "Purchase request";

/// Caller-supplied fields of a new request.
#[derive(Debug, Clone, Default)]
pub struct PurchaseInput {
    pub publication_id: Option<i64>,
    pub payment_method: Option<String>,
    pub amount: Option<f64>,
    pub notes: Option<String>,
}

/// Open a pending purchase request for `user_id`.
///
/// Rejects the request when the user already holds an unexpired grant or a
/// pending request for the publication. The store's uniqueness rule backs
/// the pending check up under concurrency.
pub async fn create_request(
    store: &dyn Store,
    user_id: i64,
    input: PurchaseInput,
    now: DateTime<Utc>,
) -> Result<PurchaseRequest, DomainError> {
    let publication_id = input
        .publication_id
        .ok_or_else(|| DomainError::Validation("Missing publicationId".into()))?;
    let amount_cents = match input.amount {
        Some(amount) => to_cents(amount)
            .ok_or_else(|| DomainError::Validation("Amount must be a non-negative number".into()))?,
        None => 0,
    };

    if store.get_publication(publication_id).await?.is_none() {
        return Err(DomainError::NotFound("Publication not found".into()));
    }
    if let Some(grant) = store.find_access(user_id, publication_id).await?
        && grant.is_active(now)
    {
        return Err(StoreError::Conflict(ACCESS_EXISTS.into()).into());
    }
    if store
        .find_pending_purchase(user_id, publication_id)
        .await?
        .is_some()
    {
        return Err(StoreError::Conflict(PENDING_PURCHASE_EXISTS.into()).into());
    }

    let request = store
        .create_purchase(NewPurchaseRequest {
            user_id,
            publication_id,
            payment_method: non_empty(input.payment_method)
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            amount_cents,
            notes: Some(non_empty(input.notes).unwrap_or_else(|| DEFAULT_NOTES.to_string())),
        })
        .await?;

    info!(
        purchase_id = request.id,
        user_id, publication_id, amount_cents, "purchase request created"
    );
    Ok(request)
}

/// Approve a pending request, issuing a digital token and an access grant.
pub async fn approve(
    store: &dyn Store,
    purchase_id: i64,
    approver_id: i64,
    now: DateTime<Utc>,
) -> Result<ApprovalOutcome, DomainError> {
    ensure_pending(store, purchase_id, Decision::Approve).await?;

    let outcome = store
        .approve_purchase(
            purchase_id,
            Approval {
                approver_id,
                token: mint_digital_token(),
                decided_at: now,
                expires_at: digital_access_expiry(now),
            },
        )
        .await?;

    info!(
        purchase_id,
        approver_id,
        user_id = outcome.updated_request.user_id,
        publication_id = outcome.updated_request.publication_id,
        "purchase approved"
    );
    Ok(outcome)
}

/// Reject a pending request. No tokens or grants are touched.
pub async fn reject(
    store: &dyn Store,
    purchase_id: i64,
    approver_id: i64,
    now: DateTime<Utc>,
) -> Result<PurchaseRequest, DomainError> {
    ensure_pending(store, purchase_id, Decision::Reject).await?;
    let updated = store.reject_purchase(purchase_id, approver_id, now).await?;
    info!(purchase_id, approver_id, "purchase rejected");
    Ok(updated)
}

async fn ensure_pending(
    store: &dyn Store,
    purchase_id: i64,
    decision: Decision,
) -> Result<(), DomainError> {
    let request = store
        .get_purchase(purchase_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(PURCHASE_NOT_FOUND.into()))?;
    if request.status.decide(decision).is_none() {
        return Err(DomainError::Validation(PURCHASE_NOT_PENDING.into()));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
