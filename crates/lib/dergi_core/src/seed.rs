//! Reference data and demo accounts.
//!
//! Safe to run repeatedly: existing roles, users, publications and
//! assignments are left as they are.

use chrono::Utc;
use tracing::info;

use crate::auth::password::hash_password;
use crate::error::DomainError;
use crate::models::auth::{NewRole, NewUser, Role, User};
use crate::models::publication::{NewAccess, NewPublication, Publication, PublicationType};
use crate::store::Store;

/// Password of every seeded account.
pub const SEED_PASSWORD: &str = "123456";

struct RoleSeed {
    name: &'static str,
    description: &'static str,
    permissions: &'static [&'static str],
    color: &'static str,
    icon: &'static str,
}

const ROLES: &[RoleSeed] = &[
    RoleSeed {
        name: "owner",
        description: "Dergi sahibi - Tam yetki",
        permissions: &["all"],
        color: "#FF6B35",
        icon: "crown",
    },
    RoleSeed {
        name: "admin",
        description: "Yönetici - Tüm yayınlara erişim",
        permissions: &["manage_users", "manage_publications", "access_all", "manage_roles"],
        color: "#D62828",
        icon: "shield",
    },
    RoleSeed {
        name: "editor",
        description: "Editör - İçerik yönetimi",
        permissions: &["edit_content", "publish_content", "access_assigned"],
        color: "#003049",
        icon: "edit",
    },
    RoleSeed {
        name: "moderator",
        description: "Moderatör - İçerik moderasyonu",
        permissions: &["moderate_content", "access_public"],
        color: "#F77F00",
        icon: "moderator",
    },
    RoleSeed {
        name: "author",
        description: "Yazar - İçerik oluşturma",
        permissions: &["create_content", "access_own"],
        color: "#2A9D8F",
        icon: "pen",
    },
    RoleSeed {
        name: "subscriber",
        description: "Abone - Premium içerik erişimi",
        permissions: &["access_subscribed"],
        color: "#264653",
        icon: "star",
    },
    RoleSeed {
        name: "member",
        description: "Üye - Temel erişim",
        permissions: &["access_public"],
        color: "#6B7280",
        icon: "user",
    },
];

struct UserSeed {
    email: &'static str,
    name: &'static str,
    bio: &'static str,
    role: &'static str,
}

const USERS: &[UserSeed] = &[
    UserSeed {
        email: "admin@dergi.local",
        name: "Admin User",
        bio: "Dergi Rastgele sistem yöneticisi",
        role: "admin",
    },
    UserSeed {
        email: "test@dergi.local",
        name: "Test Admin",
        bio: "Test yönetici hesabı",
        role: "admin",
    },
    UserSeed {
        email: "user@dergi.local",
        name: "Normal User",
        bio: "Normal üye hesabı",
        role: "member",
    },
];

/// What a seed run left in the store.
#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub roles: Vec<String>,
    pub users: Vec<String>,
    pub publications: Vec<String>,
}

pub async fn seed(store: &dyn Store) -> Result<SeedSummary, DomainError> {
    let mut roles: Vec<Role> = Vec::with_capacity(ROLES.len());
    for r in ROLES {
        let role = store
            .upsert_role(NewRole {
                name: r.name.to_string(),
                description: Some(r.description.to_string()),
                permissions: r.permissions.iter().map(|p| p.to_string()).collect(),
                color: Some(r.color.to_string()),
                icon: Some(r.icon.to_string()),
            })
            .await?;
        roles.push(role);
    }

    let mut users: Vec<User> = Vec::with_capacity(USERS.len());
    for u in USERS {
        let user = ensure_user(store, u).await?;
        if let Some(role) = roles.iter().find(|r| r.name == u.role)
            && !store.has_role(user.id, role.id).await?
        {
            store.assign_role(user.id, role.id).await?;
        }
        users.push(user);
    }

    let publications = ensure_publications(store).await?;

    // The first admin holds an explicit grant on every seeded publication.
    if let Some(admin) = users.first() {
        for publication in &publications {
            if store.find_access(admin.id, publication.id).await?.is_none() {
                store
                    .grant_access(NewAccess {
                        user_id: admin.id,
                        publication_id: publication.id,
                        access_type: "admin".into(),
                        expires_at: None,
                    })
                    .await?;
            }
        }
    }

    let summary = SeedSummary {
        roles: roles.into_iter().map(|r| r.name).collect(),
        users: users.into_iter().map(|u| u.email).collect(),
        publications: publications.into_iter().map(|p| p.title).collect(),
    };
    info!(
        roles = summary.roles.len(),
        users = summary.users.len(),
        publications = summary.publications.len(),
        "seed complete"
    );
    Ok(summary)
}

async fn ensure_user(store: &dyn Store, seed: &UserSeed) -> Result<User, DomainError> {
    if let Some(existing) = store.find_user_by_email(seed.email).await? {
        return Ok(existing.user);
    }
    let user = store
        .create_user(NewUser {
            email: seed.email.to_string(),
            name: Some(seed.name.to_string()),
            password_hash: hash_password(SEED_PASSWORD)?,
            bio: Some(seed.bio.to_string()),
        })
        .await?;
    Ok(user)
}

fn seed_publications() -> Vec<NewPublication> {
    let now = Utc::now();
    vec![
        NewPublication {
            title: "Dijital Dergi Sayı 1".into(),
            description: Some(
                "İlk dijital dergi sayımız. Teknoloji, bilim ve kültür dünyasından en güncel haberler."
                    .into(),
            ),
            publication_type: PublicationType::Magazine,
            issue: Some("Sayı 1".into()),
            page_count: 64,
            file_key: "/publications/magazine-1.flipbook".into(),
            cover_image: Some("/covers/magazine-1.jpg".into()),
            is_public: true,
            published_at: Some(now),
        },
        NewPublication {
            title: "Teknoloji Serisi: Yapay Zeka".into(),
            description: Some(
                "Yapay zeka dünyasına kapsamlı bir bakış. 410 sayfalık detaylı inceleme.".into(),
            ),
            publication_type: PublicationType::MiniSeries,
            issue: Some("Seri A".into()),
            page_count: 410,
            file_key: "/publications/ai-series.flipbook".into(),
            cover_image: Some("/covers/ai-series.jpg".into()),
            is_public: true,
            published_at: Some(now),
        },
    ]
}

async fn ensure_publications(store: &dyn Store) -> Result<Vec<Publication>, DomainError> {
    let existing = store.list_publications().await?;
    let mut out = Vec::new();
    for new in seed_publications() {
        match existing.iter().find(|p| p.title == new.title) {
            Some(found) => out.push(found.clone()),
            None => out.push(store.create_publication(new).await?),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::capability::{Capability, has_capability};
    use crate::auth::password::verify_password;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn seed_is_idempotent() {
        let store = MemoryStore::new();
        let first = seed(&store).await.unwrap();
        let second = seed(&store).await.unwrap();

        assert_eq!(first.roles.len(), 7);
        assert_eq!(first.publications, second.publications);
        assert_eq!(store.count_roles().await.unwrap(), 7);
        assert_eq!(store.count_users().await.unwrap(), 3);
        assert_eq!(store.list_publications().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn seeded_accounts_have_expected_roles() {
        let store = MemoryStore::new();
        seed(&store).await.unwrap();

        let admin = store.find_user_by_email("admin@dergi.local").await.unwrap().unwrap();
        assert!(verify_password(SEED_PASSWORD, &admin.password_hash).unwrap());
        let admin_roles = store.user_roles(admin.user.id).await.unwrap();
        assert!(has_capability(&admin_roles, Capability::Administer));

        let member = store.find_user_by_email("user@dergi.local").await.unwrap().unwrap();
        let member_roles = store.user_roles(member.user.id).await.unwrap();
        assert_eq!(member_roles, vec!["member".to_string()]);
        assert!(!has_capability(&member_roles, Capability::Administer));
    }
}
