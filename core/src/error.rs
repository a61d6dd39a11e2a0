//! Error types for the request layer.
//!
//! # Design
//! Every failure is a variant of `ApiError` so callers can match on the
//! category. The `Display` text of each variant is the exact message the
//! mobile host shows to the user ("No Internet Connection", "URL is not
//! valid", ...), so formatting to a string only happens at the outer
//! boundary via `to_string()` / `message()`.

use serde::{Deserialize, Serialize};

/// Structured error body returned by the remote service.
///
/// Decoded from the same bytes as a success body. The user-facing text is
/// `description`, not `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(alias = "httpStatus")]
    pub http_status: i64,
    pub message: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Errors delivered by `RequestExecutor` and `ApiClient`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The reachability signal reported no network; nothing was sent.
    #[error("No Internet Connection")]
    NoConnectivity,

    /// The path did not form a valid URL after percent-encoding.
    #[error("URL is not valid")]
    InvalidUrl,

    /// DNS, connect, TLS, timeout or stream failure during the exchange.
    #[error("error {0}")]
    Transport(String),

    /// The far end answered with a structured error body.
    #[error("{}", .0.description.as_deref().unwrap_or(""))]
    Service(ServiceError),

    /// The body matched neither the expected schema nor `ServiceError`.
    #[error("unknown parse error")]
    UnknownParse,

    /// Local file could not be read, written or moved.
    #[error("{0}")]
    Filesystem(#[from] std::io::Error),
}

impl ApiError {
    /// The user-facing message, as delivered through string callbacks.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// HTTP status carried by a service error, if any.
    pub fn http_status(&self) -> Option<i64> {
        match self {
            ApiError::Service(err) => Some(err.http_status),
            _ => None,
        }
    }
}
