//! Role-based capability check.
//!
//! The single place that maps role names to what they allow. Role names are
//! compared trimmed and lower-cased.

/// Something a route can require of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Decide purchases, list all purchases, assign roles, grant access and
    /// read any publication with the `admin` tier.
    Administer,
}

/// Roles that carry [`Capability::Administer`].
pub const PRIVILEGED_ROLES: &[&str] = &["admin", "owner", "moderator"];

impl Capability {
    /// Role names that grant this capability.
    pub fn granted_by(&self) -> &'static [&'static str] {
        match self {
            Capability::Administer => PRIVILEGED_ROLES,
        }
    }
}

/// Canonical form of a role name.
pub fn normalize_role(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether any of `roles` grants `capability`.
pub fn has_capability<S: AsRef<str>>(roles: &[S], capability: Capability) -> bool {
    let granted = capability.granted_by();
    roles
        .iter()
        .map(|r| normalize_role(r.as_ref()))
        .any(|r| granted.contains(&r.as_str()))
}
