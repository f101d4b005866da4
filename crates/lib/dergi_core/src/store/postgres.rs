//! PostgreSQL store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{
    ACCESS_EXISTS, EMAIL_TAKEN, PENDING_PURCHASE_EXISTS, PURCHASE_NOT_FOUND, PURCHASE_NOT_PENDING,
    ROLE_ALREADY_ASSIGNED, Store, StoreError, StoreResult,
};
use crate::models::auth::{NewRole, NewUser, Role, User, UserRoleAssignment, UserWithPassword};
use crate::models::publication::{NewAccess, NewPublication, Publication, PublicationAccess};
use crate::models::purchase::{
    Approval, ApprovalOutcome, Decision, NewPurchaseRequest, PurchaseRequest, PurchaseStatus,
    PurchaseView,
};
use crate::models::token::{AccessToken, DigitalAccessToken, DigitalTokenView, NewAccessToken};
use crate::tokens::{DIGITAL_TOKEN_ACCESS_TYPE, PURCHASE_GRANT_ACCESS_TYPE};

/// [`Store`] backed by a PostgreSQL pool. Run [`crate::migrate::migrate`] first.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn publications_by_id(&self, ids: &[i64]) -> StoreResult<HashMap<i64, Publication>> {
        let rows = sqlx::query_as::<_, Publication>(
            "SELECT id, title, description, type, issue, page_count, file_key, cover_image, \
             is_public, published_at, created_at \
             FROM publications WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn users_by_id(&self, ids: &[i64]) -> StoreResult<HashMap<i64, User>> {
        let rows = sqlx::query_as::<_, User>(
            "SELECT id, email, name, bio, created_at FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|u| (u.id, u)).collect())
    }

    async fn purchase_views(
        &self,
        requests: Vec<PurchaseRequest>,
        with_users: bool,
    ) -> StoreResult<Vec<PurchaseView>> {
        let publication_ids: Vec<i64> = requests.iter().map(|r| r.publication_id).collect();
        let publications = self.publications_by_id(&publication_ids).await?;
        let users = if with_users {
            let user_ids: Vec<i64> = requests.iter().map(|r| r.user_id).collect();
            self.users_by_id(&user_ids).await?
        } else {
            HashMap::new()
        };

        requests
            .into_iter()
            .map(|request| {
                let publication = publications
                    .get(&request.publication_id)
                    .map(Publication::summary)
                    .ok_or_else(|| {
                        StoreError::Internal(format!(
                            "publication {} missing for purchase {}",
                            request.publication_id, request.id
                        ))
                    })?;
                let user = users.get(&request.user_id).cloned();
                Ok(PurchaseView {
                    request,
                    publication,
                    user,
                })
            })
            .collect()
    }
}

/// Translate constraint violations into domain conflicts.
fn map_conflict(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let message = match db.constraint() {
                Some("users_email_key") => EMAIL_TAKEN,
                Some("purchase_requests_one_pending") => PENDING_PURCHASE_EXISTS,
                Some("publication_access_user_publication_key") => ACCESS_EXISTS,
                Some("user_roles_pkey") => ROLE_ALREADY_ASSIGNED,
                other => {
                    return StoreError::Conflict(format!(
                        "unique constraint {} violated",
                        other.unwrap_or("unknown")
                    ));
                }
            };
            return StoreError::Conflict(message.to_string());
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound("referenced record does not exist".into());
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserWithPassword>> {
        let row = sqlx::query_as::<_, UserWithPassword>(
            "SELECT id, email, name, bio, created_at, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            "SELECT id, email, name, bio, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_user_with_roles(&self, user: NewUser, role_ids: &[i64]) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, name, password_hash, bio) VALUES ($1, $2, $3, $4) \
             RETURNING id, email, name, bio, created_at",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_conflict)?;

        for role_id in role_ids {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(created.id)
                .bind(role_id)
                .execute(&mut *tx)
                .await
                .map_err(map_conflict)?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn user_roles(&self, user_id: i64) -> StoreResult<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, permissions, color, icon FROM roles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_roles(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_role_by_id(&self, role_id: i64) -> StoreResult<Option<Role>> {
        let row = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, permissions, color, icon FROM roles WHERE id = $1",
        )
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let row = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, permissions, color, icon FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_role(&self, role: NewRole) -> StoreResult<Role> {
        // The no-op update makes RETURNING yield the existing row.
        let row = sqlx::query_as::<_, Role>(
            "INSERT INTO roles (name, description, permissions, color, icon) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, name, description, permissions, color, icon",
        )
        .bind(&role.name)
        .bind(&role.description)
        .bind(&role.permissions)
        .bind(&role.color)
        .bind(&role.icon)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn has_role(&self, user_id: i64, role_id: i64) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = $1 AND role_id = $2)",
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn assign_role(&self, user_id: i64, role_id: i64) -> StoreResult<UserRoleAssignment> {
        let assigned_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) RETURNING assigned_at",
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_conflict)?;

        let role = self
            .find_role_by_id(role_id)
            .await?
            .ok_or_else(|| StoreError::NotFound("Role not found".into()))?;

        Ok(UserRoleAssignment {
            user_id,
            role_id,
            assigned_at,
            role,
        })
    }

    async fn list_public_publications(&self) -> StoreResult<Vec<Publication>> {
        let rows = sqlx::query_as::<_, Publication>(
            "SELECT id, title, description, type, issue, page_count, file_key, cover_image, \
             is_public, published_at, created_at \
             FROM publications WHERE is_public \
             ORDER BY published_at DESC NULLS LAST, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_publications(&self) -> StoreResult<Vec<Publication>> {
        let rows = sqlx::query_as::<_, Publication>(
            "SELECT id, title, description, type, issue, page_count, file_key, cover_image, \
             is_public, published_at, created_at \
             FROM publications ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_publication(&self, publication_id: i64) -> StoreResult<Option<Publication>> {
        let row = sqlx::query_as::<_, Publication>(
            "SELECT id, title, description, type, issue, page_count, file_key, cover_image, \
             is_public, published_at, created_at \
             FROM publications WHERE id = $1",
        )
        .bind(publication_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_publication(&self, publication: NewPublication) -> StoreResult<Publication> {
        let row = sqlx::query_as::<_, Publication>(
            "INSERT INTO publications \
             (title, description, type, issue, page_count, file_key, cover_image, is_public, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, title, description, type, issue, page_count, file_key, cover_image, \
             is_public, published_at, created_at",
        )
        .bind(&publication.title)
        .bind(&publication.description)
        .bind(publication.publication_type)
        .bind(&publication.issue)
        .bind(publication.page_count)
        .bind(&publication.file_key)
        .bind(&publication.cover_image)
        .bind(publication.is_public)
        .bind(publication.published_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_access(
        &self,
        user_id: i64,
        publication_id: i64,
    ) -> StoreResult<Option<PublicationAccess>> {
        let row = sqlx::query_as::<_, PublicationAccess>(
            "SELECT id, user_id, publication_id, access_type, granted_at, expires_at \
             FROM publication_access WHERE user_id = $1 AND publication_id = $2",
        )
        .bind(user_id)
        .bind(publication_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn grant_access(&self, access: NewAccess) -> StoreResult<PublicationAccess> {
        sqlx::query_as::<_, PublicationAccess>(
            "INSERT INTO publication_access (user_id, publication_id, access_type, expires_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, publication_id) DO UPDATE \
             SET access_type = EXCLUDED.access_type, granted_at = now(), expires_at = EXCLUDED.expires_at \
             RETURNING id, user_id, publication_id, access_type, granted_at, expires_at",
        )
        .bind(access.user_id)
        .bind(access.publication_id)
        .bind(&access.access_type)
        .bind(access.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_conflict)
    }

    async fn find_pending_purchase(
        &self,
        user_id: i64,
        publication_id: i64,
    ) -> StoreResult<Option<PurchaseRequest>> {
        let row = sqlx::query_as::<_, PurchaseRequest>(
            "SELECT id, user_id, publication_id, payment_method, amount_cents, notes, status, \
             approved_by, created_at, updated_at \
             FROM purchase_requests \
             WHERE user_id = $1 AND publication_id = $2 AND status = 'pending'",
        )
        .bind(user_id)
        .bind(publication_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_purchase(&self, purchase: NewPurchaseRequest) -> StoreResult<PurchaseRequest> {
        sqlx::query_as::<_, PurchaseRequest>(
            "INSERT INTO purchase_requests (user_id, publication_id, payment_method, amount_cents, notes) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, publication_id, payment_method, amount_cents, notes, status, \
             approved_by, created_at, updated_at",
        )
        .bind(purchase.user_id)
        .bind(purchase.publication_id)
        .bind(&purchase.payment_method)
        .bind(purchase.amount_cents)
        .bind(&purchase.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(map_conflict)
    }

    async fn get_purchase(&self, purchase_id: i64) -> StoreResult<Option<PurchaseRequest>> {
        let row = sqlx::query_as::<_, PurchaseRequest>(
            "SELECT id, user_id, publication_id, payment_method, amount_cents, notes, status, \
             approved_by, created_at, updated_at \
             FROM purchase_requests WHERE id = $1",
        )
        .bind(purchase_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_purchases_for_user(&self, user_id: i64) -> StoreResult<Vec<PurchaseView>> {
        let rows = sqlx::query_as::<_, PurchaseRequest>(
            "SELECT id, user_id, publication_id, payment_method, amount_cents, notes, status, \
             approved_by, created_at, updated_at \
             FROM purchase_requests WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.purchase_views(rows, false).await
    }

    async fn list_all_purchases(&self) -> StoreResult<Vec<PurchaseView>> {
        let rows = sqlx::query_as::<_, PurchaseRequest>(
            "SELECT id, user_id, publication_id, payment_method, amount_cents, notes, status, \
             approved_by, created_at, updated_at \
             FROM purchase_requests ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        self.purchase_views(rows, true).await
    }

    async fn approve_purchase(
        &self,
        purchase_id: i64,
        approval: Approval,
    ) -> StoreResult<ApprovalOutcome> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, PurchaseRequest>(
            "SELECT id, user_id, publication_id, payment_method, amount_cents, notes, status, \
             approved_by, created_at, updated_at \
             FROM purchase_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(purchase_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(PURCHASE_NOT_FOUND.into()))?;

        let next = current
            .status
            .decide(Decision::Approve)
            .ok_or_else(|| StoreError::InvalidState(PURCHASE_NOT_PENDING.into()))?;

        let updated_request = sqlx::query_as::<_, PurchaseRequest>(
            "UPDATE purchase_requests SET status = $2, approved_by = $3, updated_at = $4 \
             WHERE id = $1 \
             RETURNING id, user_id, publication_id, payment_method, amount_cents, notes, status, \
             approved_by, created_at, updated_at",
        )
        .bind(purchase_id)
        .bind(next)
        .bind(approval.approver_id)
        .bind(approval.decided_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE digital_access_tokens SET is_active = false \
             WHERE user_id = $1 AND publication_id = $2 AND is_active",
        )
        .bind(current.user_id)
        .bind(current.publication_id)
        .execute(&mut *tx)
        .await?;

        let digital_token = sqlx::query_as::<_, DigitalAccessToken>(
            "INSERT INTO digital_access_tokens \
             (user_id, publication_id, token, access_type, expires_at, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, true, $6) \
             RETURNING id, user_id, publication_id, token, access_type, expires_at, is_active, created_at",
        )
        .bind(current.user_id)
        .bind(current.publication_id)
        .bind(&approval.token)
        .bind(DIGITAL_TOKEN_ACCESS_TYPE)
        .bind(approval.expires_at)
        .bind(approval.decided_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_conflict)?;

        let publication_access = sqlx::query_as::<_, PublicationAccess>(
            "INSERT INTO publication_access (user_id, publication_id, access_type, granted_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, publication_id) DO UPDATE \
             SET access_type = EXCLUDED.access_type, granted_at = EXCLUDED.granted_at, \
                 expires_at = EXCLUDED.expires_at \
             RETURNING id, user_id, publication_id, access_type, granted_at, expires_at",
        )
        .bind(current.user_id)
        .bind(current.publication_id)
        .bind(PURCHASE_GRANT_ACCESS_TYPE)
        .bind(approval.decided_at)
        .bind(approval.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ApprovalOutcome {
            updated_request,
            digital_token,
            publication_access,
        })
    }

    async fn reject_purchase(
        &self,
        purchase_id: i64,
        approver_id: i64,
        decided_at: DateTime<Utc>,
    ) -> StoreResult<PurchaseRequest> {
        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_scalar::<_, PurchaseStatus>(
            "SELECT status FROM purchase_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(purchase_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(PURCHASE_NOT_FOUND.into()))?;

        let next = status
            .decide(Decision::Reject)
            .ok_or_else(|| StoreError::InvalidState(PURCHASE_NOT_PENDING.into()))?;

        let updated = sqlx::query_as::<_, PurchaseRequest>(
            "UPDATE purchase_requests SET status = $2, approved_by = $3, updated_at = $4 \
             WHERE id = $1 \
             RETURNING id, user_id, publication_id, payment_method, amount_cents, notes, status, \
             approved_by, created_at, updated_at",
        )
        .bind(purchase_id)
        .bind(next)
        .bind(approver_id)
        .bind(decided_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn list_active_digital_tokens(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<DigitalTokenView>> {
        let tokens = sqlx::query_as::<_, DigitalAccessToken>(
            "SELECT id, user_id, publication_id, token, access_type, expires_at, is_active, created_at \
             FROM digital_access_tokens \
             WHERE user_id = $1 AND is_active AND (expires_at IS NULL OR expires_at > $2) \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = tokens.iter().map(|t| t.publication_id).collect();
        let publications = self.publications_by_id(&ids).await?;

        tokens
            .into_iter()
            .map(|token| {
                let publication = publications
                    .get(&token.publication_id)
                    .map(Publication::summary)
                    .ok_or_else(|| {
                        StoreError::Internal(format!(
                            "publication {} missing for token {}",
                            token.publication_id, token.id
                        ))
                    })?;
                Ok(DigitalTokenView { token, publication })
            })
            .collect()
    }

    async fn find_access_token(
        &self,
        user_id: i64,
        publication_id: i64,
    ) -> StoreResult<Option<AccessToken>> {
        let row = sqlx::query_as::<_, AccessToken>(
            "SELECT id, user_id, publication_id, token, permissions, expires_at, created_at \
             FROM access_tokens WHERE user_id = $1 AND publication_id = $2",
        )
        .bind(user_id)
        .bind(publication_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn put_access_token(&self, token: NewAccessToken) -> StoreResult<AccessToken> {
        sqlx::query_as::<_, AccessToken>(
            "INSERT INTO access_tokens (user_id, publication_id, token, permissions, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, publication_id) DO UPDATE \
             SET token = EXCLUDED.token, permissions = EXCLUDED.permissions, \
                 expires_at = EXCLUDED.expires_at, created_at = now() \
             RETURNING id, user_id, publication_id, token, permissions, expires_at, created_at",
        )
        .bind(token.user_id)
        .bind(token.publication_id)
        .bind(&token.token)
        .bind(&token.permissions)
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_conflict)
    }
}
