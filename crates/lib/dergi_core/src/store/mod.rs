//! Persistence boundary.
//!
//! [`Store`] is implemented by [`postgres::PgStore`] for production and by
//! [`memory::MemoryStore`] for tests and local development. Uniqueness rules
//! (one pending request per pair, one grant per pair, one assignment per
//! role) are enforced by the store itself and surface as
//! [`StoreError::Conflict`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::auth::{NewRole, NewUser, Role, User, UserRoleAssignment, UserWithPassword};
use crate::models::publication::{NewAccess, NewPublication, Publication, PublicationAccess};
use crate::models::purchase::{
    Approval, ApprovalOutcome, NewPurchaseRequest, PurchaseRequest, PurchaseView,
};
use crate::models::token::{AccessToken, DigitalTokenView, NewAccessToken};

pub const EMAIL_TAKEN: &str = "Email already registered";
pub const PENDING_PURCHASE_EXISTS: &str = "Purchase request already exists";
pub const ACCESS_EXISTS: &str = "User already has access to this publication";
pub const ROLE_ALREADY_ASSIGNED: &str = "User already has this role";
pub const PURCHASE_NOT_FOUND: &str = "Purchase request not found";
pub const PURCHASE_NOT_PENDING: &str = "Purchase request is not pending";

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything the service reads from or writes to its database.
#[async_trait]
pub trait Store: Send + Sync {
    /// Connectivity check.
    async fn ping(&self) -> StoreResult<()>;

    // -- users & roles ------------------------------------------------------

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserWithPassword>>;

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>>;

    /// Fails with [`EMAIL_TAKEN`] when the email is registered.
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.create_user_with_roles(user, &[]).await
    }

    /// Create the user and its role assignments atomically: either all rows
    /// are written or none are.
    async fn create_user_with_roles(&self, user: NewUser, role_ids: &[i64]) -> StoreResult<User>;

    async fn count_users(&self) -> StoreResult<i64>;

    /// Role names assigned to a user.
    async fn user_roles(&self, user_id: i64) -> StoreResult<Vec<String>>;

    async fn list_roles(&self) -> StoreResult<Vec<Role>>;

    async fn count_roles(&self) -> StoreResult<i64>;

    async fn find_role_by_id(&self, role_id: i64) -> StoreResult<Option<Role>>;

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;

    /// Create a role, or return the existing one with that name unchanged.
    async fn upsert_role(&self, role: NewRole) -> StoreResult<Role>;

    async fn has_role(&self, user_id: i64, role_id: i64) -> StoreResult<bool>;

    /// Fails with [`ROLE_ALREADY_ASSIGNED`] on a duplicate.
    async fn assign_role(&self, user_id: i64, role_id: i64) -> StoreResult<UserRoleAssignment>;

    // -- publications & grants ---------------------------------------------

    /// Public publications, newest first.
    async fn list_public_publications(&self) -> StoreResult<Vec<Publication>>;

    async fn list_publications(&self) -> StoreResult<Vec<Publication>>;

    async fn get_publication(&self, publication_id: i64) -> StoreResult<Option<Publication>>;

    async fn create_publication(&self, publication: NewPublication) -> StoreResult<Publication>;

    async fn find_access(
        &self,
        user_id: i64,
        publication_id: i64,
    ) -> StoreResult<Option<PublicationAccess>>;

    /// Insert a grant, replacing type and expiry of an existing one.
    async fn grant_access(&self, access: NewAccess) -> StoreResult<PublicationAccess>;

    // -- purchases ----------------------------------------------------------

    async fn find_pending_purchase(
        &self,
        user_id: i64,
        publication_id: i64,
    ) -> StoreResult<Option<PurchaseRequest>>;

    /// Fails with [`PENDING_PURCHASE_EXISTS`] when a pending request exists.
    async fn create_purchase(&self, purchase: NewPurchaseRequest) -> StoreResult<PurchaseRequest>;

    async fn get_purchase(&self, purchase_id: i64) -> StoreResult<Option<PurchaseRequest>>;

    /// A user's requests, newest first.
    async fn list_purchases_for_user(&self, user_id: i64) -> StoreResult<Vec<PurchaseView>>;

    /// All requests with their users, newest first.
    async fn list_all_purchases(&self) -> StoreResult<Vec<PurchaseView>>;

    /// Atomically approve a pending request: flip its status, deactivate older
    /// digital tokens for the pair, insert the new token and upsert the grant.
    ///
    /// The pending check is repeated inside the transaction; a request decided
    /// concurrently fails with [`PURCHASE_NOT_PENDING`] and nothing is written.
    async fn approve_purchase(
        &self,
        purchase_id: i64,
        approval: Approval,
    ) -> StoreResult<ApprovalOutcome>;

    /// Reject a pending request. Same atomicity as [`Store::approve_purchase`].
    async fn reject_purchase(
        &self,
        purchase_id: i64,
        approver_id: i64,
        decided_at: DateTime<Utc>,
    ) -> StoreResult<PurchaseRequest>;

    // -- tokens -------------------------------------------------------------

    /// Active, unexpired digital tokens of a user, newest first.
    async fn list_active_digital_tokens(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<DigitalTokenView>>;

    async fn find_access_token(
        &self,
        user_id: i64,
        publication_id: i64,
    ) -> StoreResult<Option<AccessToken>>;

    /// Insert a reader token, replacing the pair's existing one.
    async fn put_access_token(&self, token: NewAccessToken) -> StoreResult<AccessToken>;
}
