//! API server configuration.

use dergi_core::auth::jwt::resolve_jwt_secret;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3000").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Session signing secret.
    pub jwt_secret: String,
    /// Mark session cookies `Secure`.
    pub secure_cookies: bool,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                             |
    /// |------------------------------|-------------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:3000`                    |
    /// | `DATABASE_URL`               | `postgres://localhost:5432/dergi`   |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file       |
    /// | `DERGI_ENV`                  | unset; `production` → secure cookies |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/dergi".into()),
            jwt_secret: resolve_jwt_secret(),
            secure_cookies: is_production(std::env::var("DERGI_ENV").ok().as_deref()),
        }
    }
}

fn is_production(env: Option<&str>) -> bool {
    env.is_some_and(|v| v.trim().eq_ignore_ascii_case("production"))
}
