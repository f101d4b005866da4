//! Domain models.
//!
//! Row structs double as response payloads; field names serialize as
//! camelCase.

pub mod auth;
pub mod money;
pub mod publication;
pub mod purchase;
pub mod token;
