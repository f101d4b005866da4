//! Authentication request handlers.

use axum::extract::State;
use axum::{Extension, Json};
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{LoginRequest, MessageResponse, RegisterRequest, SessionUser};
use crate::services::auth;
use crate::services::cookies::{clear_session_cookie, session_cookie};

/// `POST /api/auth/login`: authenticate and set the session cookie.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<SessionUser>)> {
    let session = auth::login(
        state.store.as_ref(),
        &body.email,
        &body.password,
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    let jar = jar.add(session_cookie(&session.token, state.config.secure_cookies));
    Ok((jar, Json(session.user)))
}

/// `POST /api/auth/register`: create an account and sign it in.
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<(CookieJar, Json<SessionUser>)> {
    let session = auth::register(
        state.store.as_ref(),
        &body.email,
        &body.password,
        body.name.as_deref(),
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    let jar = jar.add(session_cookie(&session.token, state.config.secure_cookies));
    Ok((jar, Json(session.user)))
}

/// `POST /api/auth/logout`: clear the session cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.add(clear_session_cookie(state.config.secure_cookies));
    (
        jar,
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    )
}

/// `GET /api/auth/me`
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<SessionUser>> {
    let me = auth::me(state.store.as_ref(), user.user_id()).await?;
    Ok(Json(me))
}
