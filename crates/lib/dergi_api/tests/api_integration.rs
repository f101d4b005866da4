//! Integration tests: build the router over a seeded in-memory store and
//! drive it with `oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration, Utc};
use dergi_api::{AppState, config::ApiConfig};
use dergi_core::auth::jwt::verify_session;
use dergi_core::models::publication::{NewPublication, PublicationType};
use dergi_core::models::purchase::PurchaseStatus;
use dergi_core::store::Store;
use dergi_core::store::memory::MemoryStore;
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

async fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    dergi_core::seed::seed(store.as_ref()).await.expect("seed");
    let state = AppState {
        store: store.clone(),
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            database_url: String::new(),
            jwt_secret: SECRET.into(),
            secure_cookies: false,
        },
    };
    TestApp {
        router: dergi_api::router(state),
        store,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Option<String>, Value) {
        self.send_raw(method, uri, cookie, body.map(|b| b.to_string()))
            .await
    }

    /// Like [`TestApp::send`] but with the JSON body passed through verbatim.
    async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, Option<String>, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let req = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let set_cookie = resp
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, set_cookie, json)
    }

    /// Log in and return the `session=<token>` pair for the Cookie header.
    async fn login(&self, email: &str) -> String {
        let (status, set_cookie, _) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": email, "password": "123456"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {email}");
        let header = set_cookie.expect("session cookie");
        header.split(';').next().unwrap().to_string()
    }

    async fn user_id(&self, email: &str) -> i64 {
        self.store
            .find_user_by_email(email)
            .await
            .unwrap()
            .expect("seeded user")
            .user
            .id
    }

    async fn first_publication(&self) -> i64 {
        self.store.list_publications().await.unwrap()[0].id
    }

    async fn private_publication(&self) -> i64 {
        self.store
            .create_publication(NewPublication {
                title: "Özel Sayı".into(),
                description: None,
                publication_type: PublicationType::Magazine,
                issue: Some("Özel".into()),
                page_count: 32,
                file_key: "/publications/private.flipbook".into(),
                cover_image: None,
                is_public: false,
                published_at: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn create_purchase(&self, cookie: &str, publication_id: i64) -> (StatusCode, Value) {
        let (status, _, json) = self
            .send(
                "POST",
                "/api/purchase/create",
                Some(cookie),
                Some(json!({
                    "publicationId": publication_id,
                    "paymentMethod": "credit_card",
                    "amount": 29.99
                })),
            )
            .await;
        (status, json)
    }
}

fn parse_time(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .expect("timestamp string")
        .parse::<DateTime<Utc>>()
        .expect("RFC 3339")
}

#[tokio::test]
async fn login_sets_session_cookie_matching_user() {
    let app = test_app().await;
    let (status, set_cookie, json) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "admin@dergi.local", "password": "123456"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["email"], "admin@dergi.local");
    assert_eq!(json["roles"], json!(["admin"]));

    let header = set_cookie.expect("set-cookie");
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("SameSite=Lax"));
    assert!(header.contains("Max-Age=604800"));

    let token = header
        .split(';')
        .next()
        .and_then(|kv| kv.strip_prefix("session="))
        .expect("session token");
    let claims = verify_session(token, SECRET.as_bytes()).expect("valid token");
    assert_eq!(claims.uid, json["id"].as_i64().unwrap());
    assert_eq!(claims.roles, vec!["admin".to_string()]);

    let cookie = format!("session={token}");
    let (status, _, me) = app.send("GET", "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], json["id"]);
    assert_eq!(me["roles"], json!(["admin"]));
}

#[tokio::test]
async fn wrong_password_is_unauthorized_without_cookie() {
    let app = test_app().await;
    let (status, set_cookie, json) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "admin@dergi.local", "password": "wrong!"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(set_cookie.is_none());
    assert_eq!(json["error"], "Invalid credentials");
    assert_eq!(json["code"], "unauthorized");
}

#[tokio::test]
async fn session_routes_require_a_valid_cookie() {
    let app = test_app().await;
    let (status, _, _) = app.send("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = app
        .send("GET", "/api/auth/me", Some("session=not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = app
        .send(
            "POST",
            "/api/admin/approve-purchase",
            None,
            Some(json!({"purchaseId": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_cookie() {
    let app = test_app().await;
    let (status, set_cookie, _) = app.send("POST", "/api/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let header = set_cookie.expect("set-cookie");
    assert!(header.starts_with("session=;"));
    assert!(header.contains("Max-Age=0"));
}

#[tokio::test]
async fn duplicate_pending_request_is_rejected() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let publication = app.first_publication().await;

    let (status, first) = app.create_purchase(&member, publication).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "pending");
    assert_eq!(first["amount"], 29.99);
    assert_eq!(first["paymentMethod"], "credit_card");

    let (status, second) = app.create_purchase(&member, publication).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(second["error"], "Purchase request already exists");
    assert_eq!(second["code"], "conflict");
}

#[tokio::test]
async fn missing_publication_id_is_a_validation_error() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let (status, _, json) = app
        .send("POST", "/api/purchase/create", Some(&member), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing publicationId");
}

#[tokio::test]
async fn amount_may_be_sent_as_a_string() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let publication = app.first_publication().await;

    let (status, _, json) = app
        .send(
            "POST",
            "/api/purchase/create",
            Some(&member),
            Some(json!({
                "publicationId": publication,
                "paymentMethod": "credit_card",
                "amount": "29.99",
                "notes": ""
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["amount"], 29.99);
    assert_eq!(json["notes"], "Purchase request");
}

#[tokio::test]
async fn non_numeric_amount_is_a_validation_error() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let publication = app.first_publication().await;

    let (status, _, json) = app
        .send(
            "POST",
            "/api/purchase/create",
            Some(&member),
            Some(json!({"publicationId": publication, "amount": "free"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_error");
    assert_eq!(json["error"], "Amount must be a non-negative number");
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;

    let (status, _, json) = app
        .send_raw(
            "POST",
            "/api/purchase/create",
            Some(&member),
            Some("{not json".into()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_error");
    assert!(json["error"].is_string());

    let (status, _, json) = app
        .send(
            "POST",
            "/api/purchase/create",
            Some(&member),
            Some(json!({"publicationId": 1, "amount": [1]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_error");

    let (status, _, json) = app.send("GET", "/api/publications/abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_error");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn non_admin_cannot_decide_purchases() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let publication = app.first_publication().await;
    let (_, request) = app.create_purchase(&member, publication).await;
    let purchase_id = request["id"].as_i64().unwrap();

    for uri in ["/api/admin/approve-purchase", "/api/admin/reject-purchase"] {
        let (status, _, json) = app
            .send("POST", uri, Some(&member), Some(json!({"purchaseId": purchase_id})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(json["error"], "Forbidden");
    }

    let stored = app.store.get_purchase(purchase_id).await.unwrap().unwrap();
    assert_eq!(stored.status, PurchaseStatus::Pending);
    assert_eq!(stored.approved_by, None);
    let user_id = app.user_id("user@dergi.local").await;
    assert!(app.store.find_access(user_id, publication).await.unwrap().is_none());
}

#[tokio::test]
async fn non_admin_cannot_assign_roles() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let user_id = app.user_id("user@dergi.local").await;
    let (status, _, _) = app
        .send(
            "POST",
            "/api/admin/assign-role",
            Some(&member),
            Some(json!({"userId": user_id, "roleName": "admin"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.store.user_roles(user_id).await.unwrap(), vec!["member".to_string()]);
}

#[tokio::test]
async fn approval_happens_once_and_issues_one_token_and_grant() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let admin = app.login("admin@dergi.local").await;
    let publication = app.private_publication().await;
    let (_, request) = app.create_purchase(&member, publication).await;
    let purchase_id = request["id"].as_i64().unwrap();

    let before = Utc::now();
    let (status, _, outcome) = app
        .send(
            "POST",
            "/api/admin/approve-purchase",
            Some(&admin),
            Some(json!({"purchaseId": purchase_id.to_string()})),
        )
        .await;
    let after = Utc::now();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["updatedRequest"]["status"], "approved");
    let admin_id = app.user_id("admin@dergi.local").await;
    assert_eq!(outcome["updatedRequest"]["approvedBy"], admin_id);
    assert!(outcome["digitalToken"]["token"].as_str().unwrap().starts_with("DIGI-"));
    assert_eq!(outcome["publicationAccess"]["accessType"], "read");

    let token_expiry = parse_time(&outcome["digitalToken"]["expiresAt"]);
    let grant_expiry = parse_time(&outcome["publicationAccess"]["expiresAt"]);
    assert_eq!(token_expiry, grant_expiry);
    assert!(token_expiry >= before + Duration::days(365) - Duration::seconds(1));
    assert!(token_expiry <= after + Duration::days(365) + Duration::seconds(1));

    let (status, _, again) = app
        .send(
            "POST",
            "/api/admin/approve-purchase",
            Some(&admin),
            Some(json!({"purchaseId": purchase_id})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["error"], "Purchase request is not pending");

    let (status, _, rejected) = app
        .send(
            "POST",
            "/api/admin/reject-purchase",
            Some(&admin),
            Some(json!({"purchaseId": purchase_id})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected["error"], "Purchase request is not pending");

    let (status, _, tokens) = app
        .send("GET", "/api/user/digital-tokens", Some(&member), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let tokens = tokens.as_array().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0]["publication"]["id"], publication);
    assert_eq!(tokens[0]["token"], outcome["digitalToken"]["token"]);

    let (_, _, requests) = app
        .send("GET", "/api/user/purchase-requests", Some(&member), None)
        .await;
    assert_eq!(requests.as_array().unwrap().len(), 1);
    assert_eq!(requests[0]["status"], "approved");

    let (status, again) = app.create_purchase(&member, publication).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["error"], "User already has access to this publication");
}

#[tokio::test]
async fn rejection_leaves_no_access() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let admin = app.login("test@dergi.local").await;
    let publication = app.private_publication().await;
    let (_, request) = app.create_purchase(&member, publication).await;

    let (status, _, rejected) = app
        .send(
            "POST",
            "/api/admin/reject-purchase",
            Some(&admin),
            Some(json!({"purchaseId": request["id"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");

    let (_, _, access) = app
        .send(
            "POST",
            &format!("/api/publications/{publication}/access"),
            Some(&member),
            None,
        )
        .await;
    assert_eq!(access["access"], false);
    assert_eq!(access["accessType"], "none");
    assert_eq!(access["publication"]["fileKey"], Value::Null);

    let (status, _) = app.create_purchase(&member, publication).await;
    assert_eq!(status, StatusCode::OK, "a rejected request does not block a new one");
}

#[tokio::test]
async fn access_tiers_follow_priority() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let admin = app.login("admin@dergi.local").await;
    let public = app.first_publication().await;
    let private = app.private_publication().await;
    let access = |id: i64| format!("/api/publications/{id}/access");

    let (status, _, json) = app.send("POST", &access(private), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["access"], true);
    assert_eq!(json["accessType"], "admin");
    assert_eq!(json["publication"]["fileKey"], "/publications/private.flipbook");
    let token = json["publication"]["token"].as_str().unwrap().to_string();
    assert!(token.starts_with(&format!("admin_{private}_")));

    let (_, _, again) = app.send("POST", &access(private), Some(&admin), None).await;
    assert_eq!(again["publication"]["token"], token.as_str());

    let (_, _, json) = app.send("POST", &access(public), Some(&member), None).await;
    assert_eq!(json["accessType"], "public");
    assert_eq!(json["publication"]["token"], Value::Null);
    assert_eq!(json["userRoles"], json!(["member"]));

    let (_, _, json) = app.send("POST", &access(private), Some(&member), None).await;
    assert_eq!(json["accessType"], "none");

    let member_id = app.user_id("user@dergi.local").await;
    let (status, _, _) = app
        .send(
            "POST",
            "/api/admin/grant-access",
            Some(&admin),
            Some(json!({"userId": member_id, "publicationId": private, "accessType": "read"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, json) = app.send("POST", &access(private), Some(&member), None).await;
    assert_eq!(json["access"], true);
    assert_eq!(json["accessType"], "read");

    let (status, _, json) = app.send("POST", &access(9999), Some(&member), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn admin_role_changes_apply_without_new_login() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let admin = app.login("admin@dergi.local").await;
    let member_id = app.user_id("user@dergi.local").await;

    let (status, _, json) = app
        .send(
            "POST",
            "/api/admin/assign-role",
            Some(&admin),
            Some(json!({"userId": member_id, "roleName": "Moderator"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["role"]["name"], "moderator");

    let (status, _, json) = app
        .send(
            "POST",
            "/api/admin/assign-role",
            Some(&admin),
            Some(json!({"userId": member_id, "roleName": "moderator"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "User already has this role");

    // The old cookie still lists only `member`, but the store now says moderator.
    let (status, _, purchases) = app
        .send("GET", "/api/admin/purchases", Some(&member), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(purchases.is_array());
}

#[tokio::test]
async fn assign_role_reports_unknown_user_and_role() {
    let app = test_app().await;
    let admin = app.login("admin@dergi.local").await;
    let member_id = app.user_id("user@dergi.local").await;

    let (status, _, json) = app
        .send(
            "POST",
            "/api/admin/assign-role",
            Some(&admin),
            Some(json!({"userId": 999_999, "roleId": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "User not found");

    let (status, _, json) = app
        .send(
            "POST",
            "/api/admin/assign-role",
            Some(&admin),
            Some(json!({"userId": member_id, "roleName": "yönetici"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Role not found");

    let (status, _, _) = app
        .send(
            "POST",
            "/api/admin/assign-role",
            Some(&admin),
            Some(json!({"userId": member_id})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_lists_all_purchases_with_users() {
    let app = test_app().await;
    let member = app.login("user@dergi.local").await;
    let admin = app.login("admin@dergi.local").await;
    let publication = app.first_publication().await;
    app.create_purchase(&member, publication).await;

    let (status, _, json) = app
        .send("GET", "/api/admin/purchases", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user"]["email"], "user@dergi.local");
    assert_eq!(rows[0]["publication"]["id"], publication);
    assert!(rows[0]["publication"].get("fileKey").is_none());

    let (status, _, roles) = app.send("GET", "/api/admin/roles", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roles.as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn register_signs_in_as_member() {
    let app = test_app().await;
    let (status, set_cookie, json) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"email": "yeni@dergi.local", "password": "abcdef", "name": "Yeni"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["roles"], json!(["member"]));
    assert!(set_cookie.unwrap().starts_with("session="));

    let (status, _, json) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"email": "yeni@dergi.local", "password": "abcdef"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "conflict");
}

#[tokio::test]
async fn public_catalogue_and_health() {
    let app = test_app().await;
    let (status, _, json) = app.send("GET", "/api/publications", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let publications = json["publications"].as_array().unwrap();
    assert_eq!(publications.len(), 2);
    assert!(publications.iter().all(|p| p.get("fileKey").is_none()));

    let id = publications[0]["id"].as_i64().unwrap();
    let (status, _, json) = app
        .send("GET", &format!("/api/publications/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id);

    let (status, _, json) = app.send("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dbConnected"], true);
    assert_eq!(json["userCount"], 3);
    assert_eq!(json["roleCount"], 7);
}

#[tokio::test]
async fn grant_access_rejects_out_of_range_days() {
    let app = test_app().await;
    let admin = app.login("admin@dergi.local").await;
    let member_id = app.user_id("user@dergi.local").await;
    let private = app.private_publication().await;

    for days in [0, 100_000_000, i64::MAX] {
        let (status, _, json) = app
            .send(
                "POST",
                "/api/admin/grant-access",
                Some(&admin),
                Some(json!({"userId": member_id, "publicationId": private, "days": days})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "days={days}");
        assert_eq!(json["code"], "validation_error");
    }
    assert!(
        app.store
            .find_access(member_id, private)
            .await
            .unwrap()
            .is_none()
    );

    let (status, _, json) = app
        .send(
            "POST",
            "/api/admin/grant-access",
            Some(&admin),
            Some(json!({"userId": member_id, "publicationId": private, "days": 30})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let expires = parse_time(&json["expiresAt"]);
    assert!(expires > Utc::now() + Duration::days(29));
}
