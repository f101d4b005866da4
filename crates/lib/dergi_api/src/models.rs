//! Request and response bodies.
//!
//! All bodies are camelCase on the wire. Ids in request bodies are accepted
//! both as JSON numbers and as numeric strings.

use serde::{Deserialize, Deserializer, Serialize};

use dergi_core::models::publication::{PublicationSummary, PublicationType};

/// Deserialize an optional id from a number or a numeric string.
///
/// Unparseable strings, zero and `null` all become `None` so the handler can
/// report the field as missing.
pub fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    let id = match raw {
        Some(Raw::Int(n)) => Some(n),
        Some(Raw::Float(f)) if f.fract() == 0.0 => Some(f as i64),
        Some(Raw::Float(_)) => None,
        Some(Raw::Text(s)) => s.trim().parse::<i64>().ok(),
        None => None,
    };
    Ok(id.filter(|n| *n > 0))
}

/// Deserialize an optional amount from a number or a numeric string.
///
/// Blank strings and `null` become `None` (charged as zero). Text that is not
/// a number becomes NaN so the purchase workflow rejects it as an invalid
/// amount with the usual validation error.
pub fn lenient_amount<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let amount = match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) if s.trim().is_empty() => None,
        Some(Raw::Text(s)) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
        None => None,
    };
    Ok(amount)
}

// -- auth -------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub name: Option<String>,
}

/// The signed-in user as returned by login, register and `/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- publications -----------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationListResponse {
    pub success: bool,
    pub publications: Vec<PublicationSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPublication {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub publication_type: PublicationType,
    pub file_key: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub success: bool,
    pub access: bool,
    pub access_type: String,
    pub publication: AccessPublication,
    pub user_roles: Vec<String>,
}

// -- purchases --------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub publication_id: Option<i64>,
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDecisionRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub purchase_id: Option<i64>,
}

// -- admin ------------------------------------------------------------------

/// Either `roleId` or `roleName` identifies the role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub role_id: Option<i64>,
    pub role_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantAccessRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub publication_id: Option<i64>,
    pub access_type: Option<String>,
    /// Validity in days; omitted means no expiry.
    pub days: Option<i64>,
}

// -- health -----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub db_connected: bool,
    pub user_count: i64,
    pub role_count: i64,
    pub version: String,
}
