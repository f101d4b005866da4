//! Session cookie builders.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use dergi_core::auth::jwt::SESSION_TTL_SECS;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Build the httpOnly session cookie (7 days).
pub fn session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(SESSION_TTL_SECS))
        .build()
}

/// Build an expired session cookie to clear the session.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
