//! Response models for the authentication endpoints.
//!
//! # Design
//! Wire keys are snake_case and map straight onto the Rust field names.
//! camelCase aliases are accepted as well, since the service has sent both
//! spellings. Required fields are the ones a body must carry to count as
//! this model at all; everything else is optional so partial payloads still
//! decode.

use serde::{Deserialize, Serialize};

/// Body of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: AuthTokens,
}

/// Token bundle carried in `AuthResponse::message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "expiresIn", skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, alias = "expiresUnit", skip_serializing_if = "Option::is_none")]
    pub expires_unit: Option<String>,
    #[serde(default, alias = "requiredPasswordUpdate", skip_serializing_if = "Option::is_none")]
    pub required_password_update: Option<bool>,
}

/// Body of the access-token endpoint; `message` is the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
