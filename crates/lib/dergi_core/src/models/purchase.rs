//! Purchase request models and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::User;
use super::money::cents;
use super::publication::{PublicationAccess, PublicationSummary};
use super::token::DigitalAccessToken;

/// Purchase status, matching the `purchase_status` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "purchase_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Approved,
    Rejected,
}

/// An administrator's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Approved => "approved",
            PurchaseStatus::Rejected => "rejected",
        }
    }

    /// Apply a decision. Only `pending` requests can be decided, and only once.
    pub fn decide(self, decision: Decision) -> Option<PurchaseStatus> {
        match (self, decision) {
            (PurchaseStatus::Pending, Decision::Approve) => Some(PurchaseStatus::Approved),
            (PurchaseStatus::Pending, Decision::Reject) => Some(PurchaseStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database row for `purchase_requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub id: i64,
    pub user_id: i64,
    pub publication_id: i64,
    pub payment_method: String,
    #[serde(rename = "amount", with = "cents")]
    pub amount_cents: i64,
    pub notes: Option<String>,
    pub status: PurchaseStatus,
    pub approved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to open a purchase request.
#[derive(Debug, Clone)]
pub struct NewPurchaseRequest {
    pub user_id: i64,
    pub publication_id: i64,
    pub payment_method: String,
    pub amount_cents: i64,
    pub notes: Option<String>,
}

/// A purchase request with the publication it targets and, for admin
/// listings, the requesting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseView {
    #[serde(flatten)]
    pub request: PurchaseRequest,
    pub publication: PublicationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Inputs minted before the approval transaction runs.
#[derive(Debug, Clone)]
pub struct Approval {
    pub approver_id: i64,
    pub token: String,
    pub decided_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Everything the approval transaction wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    pub updated_request: PurchaseRequest,
    pub digital_token: DigitalAccessToken,
    pub publication_access: PublicationAccess,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_be_decided_either_way() {
        assert_eq!(
            PurchaseStatus::Pending.decide(Decision::Approve),
            Some(PurchaseStatus::Approved)
        );
        assert_eq!(
            PurchaseStatus::Pending.decide(Decision::Reject),
            Some(PurchaseStatus::Rejected)
        );
    }

    #[test]
    fn decided_requests_are_final() {
        for status in [PurchaseStatus::Approved, PurchaseStatus::Rejected] {
            assert_eq!(status.decide(Decision::Approve), None);
            assert_eq!(status.decide(Decision::Reject), None);
        }
    }

    #[test]
    fn request_serializes_amount_as_decimal() {
        let now = Utc::now();
        let req = PurchaseRequest {
            id: 7,
            user_id: 3,
            publication_id: 1,
            payment_method: "credit_card".into(),
            amount_cents: 2999,
            notes: None,
            status: PurchaseStatus::Pending,
            approved_by: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["amount"], 29.99);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["paymentMethod"], "credit_card");
    }
}
