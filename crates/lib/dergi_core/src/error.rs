//! Domain workflow errors.

use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;

/// Errors raised by the purchase, access and registration workflows.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
