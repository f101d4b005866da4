//! # dergi_api
//!
//! HTTP API library for Dergi.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use dergi_core::store::Store;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, health, publications, purchases, user};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend.
    pub store: Arc<dyn Store>,
    /// API configuration.
    pub config: ApiConfig,
}

/// Run embedded database migrations.
///
/// Delegates to `dergi_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    dergi_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no session required)
    let public = Router::new()
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(
            routes::GET_PUBLICATIONS,
            get(publications::list_publications_handler),
        )
        .route(
            routes::GET_PUBLICATIONS_ID,
            get(publications::get_publication_handler),
        )
        .route(routes::GET_HEALTH, get(health::health_handler));

    // Session routes
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(
            routes::POST_PUBLICATIONS_ID_ACCESS,
            post(publications::access_handler),
        )
        .route(
            routes::POST_PURCHASE_CREATE,
            post(purchases::create_purchase_handler),
        )
        .route(
            routes::GET_USER_PURCHASE_REQUESTS,
            get(user::purchase_requests_handler),
        )
        .route(
            routes::GET_USER_DIGITAL_TOKENS,
            get(user::digital_tokens_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_session,
        ));

    // Admin routes: session first, then the capability check
    let admin = Router::new()
        .route(routes::POST_ADMIN_ASSIGN_ROLE, post(admin::assign_role_handler))
        .route(routes::GET_ADMIN_ROLES, get(admin::list_roles_handler))
        .route(
            routes::POST_ADMIN_APPROVE_PURCHASE,
            post(purchases::approve_purchase_handler),
        )
        .route(
            routes::POST_ADMIN_REJECT_PURCHASE,
            post(purchases::reject_purchase_handler),
        )
        .route(routes::GET_ADMIN_PURCHASES, get(admin::list_purchases_handler))
        .route(
            routes::POST_ADMIN_GRANT_ACCESS,
            post(admin::grant_access_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_session,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
