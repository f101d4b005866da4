//! In-memory store.
//!
//! Intended for tests and local development. Every operation runs under a
//! single lock, so multi-step writes are as atomic as their Postgres
//! transactions and the same uniqueness rules apply.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    EMAIL_TAKEN, PENDING_PURCHASE_EXISTS, PURCHASE_NOT_FOUND, PURCHASE_NOT_PENDING,
    ROLE_ALREADY_ASSIGNED, Store, StoreError, StoreResult,
};
use crate::models::auth::{NewRole, NewUser, Role, User, UserRoleAssignment, UserWithPassword};
use crate::models::publication::{
    NewAccess, NewPublication, Publication, PublicationAccess, PublicationSummary,
};
use crate::models::purchase::{
    Approval, ApprovalOutcome, Decision, NewPurchaseRequest, PurchaseRequest, PurchaseStatus,
    PurchaseView,
};
use crate::models::token::{AccessToken, DigitalAccessToken, DigitalTokenView, NewAccessToken};
use crate::tokens::{DIGITAL_TOKEN_ACCESS_TYPE, PURCHASE_GRANT_ACCESS_TYPE};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: HashMap<i64, UserWithPassword>,
    roles: HashMap<i64, Role>,
    /// (user_id, role_id) → assigned_at
    user_roles: HashMap<(i64, i64), DateTime<Utc>>,
    publications: HashMap<i64, Publication>,
    access: HashMap<(i64, i64), PublicationAccess>,
    purchases: HashMap<i64, PurchaseRequest>,
    digital_tokens: HashMap<i64, DigitalAccessToken>,
    access_tokens: HashMap<(i64, i64), AccessToken>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn summary(&self, publication_id: i64) -> StoreResult<PublicationSummary> {
        self.publications
            .get(&publication_id)
            .map(Publication::summary)
            .ok_or_else(|| StoreError::Internal(format!("publication {publication_id} missing")))
    }

    fn purchase_views(
        &self,
        mut requests: Vec<PurchaseRequest>,
        with_users: bool,
    ) -> StoreResult<Vec<PurchaseView>> {
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        requests
            .into_iter()
            .map(|request| {
                let publication = self.summary(request.publication_id)?;
                let user = if with_users {
                    self.users.get(&request.user_id).map(|u| u.user.clone())
                } else {
                    None
                };
                Ok(PurchaseView {
                    request,
                    publication,
                    user,
                })
            })
            .collect()
    }

    /// Pending request for `id`, or the error the transaction would raise.
    fn pending(
        &self,
        purchase_id: i64,
        decision: Decision,
    ) -> StoreResult<(PurchaseRequest, PurchaseStatus)> {
        let current = self
            .purchases
            .get(&purchase_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(PURCHASE_NOT_FOUND.into()))?;
        let next = current
            .status
            .decide(decision)
            .ok_or_else(|| StoreError::InvalidState(PURCHASE_NOT_PENDING.into()))?;
        Ok((current, next))
    }
}

/// [`Store`] holding everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserWithPassword>> {
        let t = self.read()?;
        Ok(t.users.values().find(|u| u.user.email == email).cloned())
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let t = self.read()?;
        Ok(t.users.get(&user_id).map(|u| u.user.clone()))
    }

    async fn create_user_with_roles(&self, user: NewUser, role_ids: &[i64]) -> StoreResult<User> {
        let mut t = self.write()?;
        if t.users.values().any(|u| u.user.email == user.email) {
            return Err(StoreError::Conflict(EMAIL_TAKEN.into()));
        }
        if role_ids.iter().any(|id| !t.roles.contains_key(id)) {
            return Err(StoreError::NotFound("Role not found".into()));
        }
        let created = User {
            id: t.next_id(),
            email: user.email,
            name: user.name,
            bio: user.bio,
            created_at: Utc::now(),
        };
        t.users.insert(
            created.id,
            UserWithPassword {
                user: created.clone(),
                password_hash: user.password_hash,
            },
        );
        for role_id in role_ids {
            t.user_roles.insert((created.id, *role_id), created.created_at);
        }
        Ok(created)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(self.read()?.users.len() as i64)
    }

    async fn user_roles(&self, user_id: i64) -> StoreResult<Vec<String>> {
        let t = self.read()?;
        let mut names: Vec<String> = t
            .user_roles
            .keys()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, rid)| t.roles.get(rid).map(|r| r.name.clone()))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let t = self.read()?;
        let mut roles: Vec<Role> = t.roles.values().cloned().collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn count_roles(&self) -> StoreResult<i64> {
        Ok(self.read()?.roles.len() as i64)
    }

    async fn find_role_by_id(&self, role_id: i64) -> StoreResult<Option<Role>> {
        Ok(self.read()?.roles.get(&role_id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let t = self.read()?;
        Ok(t.roles.values().find(|r| r.name == name).cloned())
    }

    async fn upsert_role(&self, role: NewRole) -> StoreResult<Role> {
        let mut t = self.write()?;
        if let Some(existing) = t.roles.values().find(|r| r.name == role.name) {
            return Ok(existing.clone());
        }
        let created = Role {
            id: t.next_id(),
            name: role.name,
            description: role.description,
            permissions: role.permissions,
            color: role.color,
            icon: role.icon,
        };
        t.roles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn has_role(&self, user_id: i64, role_id: i64) -> StoreResult<bool> {
        Ok(self.read()?.user_roles.contains_key(&(user_id, role_id)))
    }

    async fn assign_role(&self, user_id: i64, role_id: i64) -> StoreResult<UserRoleAssignment> {
        let mut t = self.write()?;
        if !t.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("User not found".into()));
        }
        let role = t
            .roles
            .get(&role_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("Role not found".into()))?;
        if t.user_roles.contains_key(&(user_id, role_id)) {
            return Err(StoreError::Conflict(ROLE_ALREADY_ASSIGNED.into()));
        }
        let assigned_at = Utc::now();
        t.user_roles.insert((user_id, role_id), assigned_at);
        Ok(UserRoleAssignment {
            user_id,
            role_id,
            assigned_at,
            role,
        })
    }

    async fn list_public_publications(&self) -> StoreResult<Vec<Publication>> {
        let t = self.read()?;
        let mut rows: Vec<Publication> =
            t.publications.values().filter(|p| p.is_public).cloned().collect();
        // NULLS LAST: `Some` sorts above `None` when reversed.
        rows.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn list_publications(&self) -> StoreResult<Vec<Publication>> {
        let t = self.read()?;
        let mut rows: Vec<Publication> = t.publications.values().cloned().collect();
        rows.sort_by_key(|p| p.id);
        Ok(rows)
    }

    async fn get_publication(&self, publication_id: i64) -> StoreResult<Option<Publication>> {
        Ok(self.read()?.publications.get(&publication_id).cloned())
    }

    async fn create_publication(&self, publication: NewPublication) -> StoreResult<Publication> {
        let mut t = self.write()?;
        let created = Publication {
            id: t.next_id(),
            title: publication.title,
            description: publication.description,
            publication_type: publication.publication_type,
            issue: publication.issue,
            page_count: publication.page_count,
            file_key: publication.file_key,
            cover_image: publication.cover_image,
            is_public: publication.is_public,
            published_at: publication.published_at,
            created_at: Utc::now(),
        };
        t.publications.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_access(
        &self,
        user_id: i64,
        publication_id: i64,
    ) -> StoreResult<Option<PublicationAccess>> {
        Ok(self.read()?.access.get(&(user_id, publication_id)).cloned())
    }

    async fn grant_access(&self, access: NewAccess) -> StoreResult<PublicationAccess> {
        let mut t = self.write()?;
        if !t.users.contains_key(&access.user_id)
            || !t.publications.contains_key(&access.publication_id)
        {
            return Err(StoreError::NotFound("referenced record does not exist".into()));
        }
        let key = (access.user_id, access.publication_id);
        let existing = t.access.get(&key).map(|e| e.id);
        let id = existing.unwrap_or_else(|| t.next_id());
        let grant = PublicationAccess {
            id,
            user_id: access.user_id,
            publication_id: access.publication_id,
            access_type: access.access_type,
            granted_at: Utc::now(),
            expires_at: access.expires_at,
        };
        t.access.insert(key, grant.clone());
        Ok(grant)
    }

    async fn find_pending_purchase(
        &self,
        user_id: i64,
        publication_id: i64,
    ) -> StoreResult<Option<PurchaseRequest>> {
        let t = self.read()?;
        Ok(t.purchases
            .values()
            .find(|p| {
                p.user_id == user_id
                    && p.publication_id == publication_id
                    && p.status == PurchaseStatus::Pending
            })
            .cloned())
    }

    async fn create_purchase(&self, purchase: NewPurchaseRequest) -> StoreResult<PurchaseRequest> {
        let mut t = self.write()?;
        if !t.users.contains_key(&purchase.user_id)
            || !t.publications.contains_key(&purchase.publication_id)
        {
            return Err(StoreError::NotFound("referenced record does not exist".into()));
        }
        let duplicate = t.purchases.values().any(|p| {
            p.user_id == purchase.user_id
                && p.publication_id == purchase.publication_id
                && p.status == PurchaseStatus::Pending
        });
        if duplicate {
            return Err(StoreError::Conflict(PENDING_PURCHASE_EXISTS.into()));
        }
        let now = Utc::now();
        let created = PurchaseRequest {
            id: t.next_id(),
            user_id: purchase.user_id,
            publication_id: purchase.publication_id,
            payment_method: purchase.payment_method,
            amount_cents: purchase.amount_cents,
            notes: purchase.notes,
            status: PurchaseStatus::Pending,
            approved_by: None,
            created_at: now,
            updated_at: now,
        };
        t.purchases.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_purchase(&self, purchase_id: i64) -> StoreResult<Option<PurchaseRequest>> {
        Ok(self.read()?.purchases.get(&purchase_id).cloned())
    }

    async fn list_purchases_for_user(&self, user_id: i64) -> StoreResult<Vec<PurchaseView>> {
        let t = self.read()?;
        let rows = t
            .purchases
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        t.purchase_views(rows, false)
    }

    async fn list_all_purchases(&self) -> StoreResult<Vec<PurchaseView>> {
        let t = self.read()?;
        let rows = t.purchases.values().cloned().collect();
        t.purchase_views(rows, true)
    }

    async fn approve_purchase(
        &self,
        purchase_id: i64,
        approval: Approval,
    ) -> StoreResult<ApprovalOutcome> {
        let mut t = self.write()?;
        let (current, next) = t.pending(purchase_id, Decision::Approve)?;

        if t.digital_tokens.values().any(|d| d.token == approval.token) {
            return Err(StoreError::Conflict("token already issued".into()));
        }

        let updated_request = PurchaseRequest {
            status: next,
            approved_by: Some(approval.approver_id),
            updated_at: approval.decided_at,
            ..current
        };

        for token in t.digital_tokens.values_mut() {
            if token.user_id == updated_request.user_id
                && token.publication_id == updated_request.publication_id
            {
                token.is_active = false;
            }
        }

        let digital_token = DigitalAccessToken {
            id: t.next_id(),
            user_id: updated_request.user_id,
            publication_id: updated_request.publication_id,
            token: approval.token,
            access_type: DIGITAL_TOKEN_ACCESS_TYPE.to_string(),
            expires_at: Some(approval.expires_at),
            is_active: true,
            created_at: approval.decided_at,
        };

        let key = (updated_request.user_id, updated_request.publication_id);
        let existing = t.access.get(&key).map(|e| e.id);
        let access_id = existing.unwrap_or_else(|| t.next_id());
        let publication_access = PublicationAccess {
            id: access_id,
            user_id: updated_request.user_id,
            publication_id: updated_request.publication_id,
            access_type: PURCHASE_GRANT_ACCESS_TYPE.to_string(),
            granted_at: approval.decided_at,
            expires_at: Some(approval.expires_at),
        };

        t.purchases.insert(purchase_id, updated_request.clone());
        t.digital_tokens.insert(digital_token.id, digital_token.clone());
        t.access.insert(key, publication_access.clone());

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
        let mut t = self.write()?;
        let (current, next) = t.pending(purchase_id, Decision::Reject)?;
        let updated = PurchaseRequest {
            status: next,
            approved_by: Some(approver_id),
            updated_at: decided_at,
            ..current
        };
        t.purchases.insert(purchase_id, updated.clone());
        Ok(updated)
    }

    async fn list_active_digital_tokens(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<DigitalTokenView>> {
        let t = self.read()?;
        let mut tokens: Vec<DigitalAccessToken> = t
            .digital_tokens
            .values()
            .filter(|d| d.user_id == user_id && d.is_usable(now))
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        tokens
            .into_iter()
            .map(|token| {
                let publication = t.summary(token.publication_id)?;
                Ok(DigitalTokenView { token, publication })
            })
            .collect()
    }

    async fn find_access_token(
        &self,
        user_id: i64,
        publication_id: i64,
    ) -> StoreResult<Option<AccessToken>> {
        Ok(self.read()?.access_tokens.get(&(user_id, publication_id)).cloned())
    }

    async fn put_access_token(&self, token: NewAccessToken) -> StoreResult<AccessToken> {
        let mut t = self.write()?;
        let key = (token.user_id, token.publication_id);
        let existing = t.access_tokens.get(&key).map(|e| e.id);
        let id = existing.unwrap_or_else(|| t.next_id());
        let stored = AccessToken {
            id,
            user_id: token.user_id,
            publication_id: token.publication_id,
            token: token.token,
            permissions: token.permissions,
            expires_at: token.expires_at,
            created_at: Utc::now(),
        };
        t.access_tokens.insert(key, stored.clone());
        Ok(stored)
    }
}
