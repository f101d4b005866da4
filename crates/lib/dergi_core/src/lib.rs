//! # dergi_core
//!
//! Core domain logic for Dergi: sessions, capabilities, the purchase
//! workflow and publication access resolution.

pub mod access;
pub mod auth;
pub mod error;
pub mod migrate;
pub mod models;
pub mod purchase;
pub mod seed;
pub mod store;
pub mod tokens;

pub use error::DomainError;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
