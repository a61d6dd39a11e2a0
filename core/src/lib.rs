//! HTTP request/response layer for the mobile client.
//!
//! # Overview
//! Issues GET/POST/PUT/DELETE requests, decodes JSON bodies into typed
//! models, and separates service-reported errors from transport failures.
//! Also streams file downloads and uploads with progress reporting.
//!
//! # Design
//! - `RequestExecutor` owns request construction, the connectivity gate,
//!   dispatch through a `Transport`, and file transfers.
//! - `ApiClient` decodes each `RawResponse` into the caller's schema type or
//!   a classified `ApiError`.
//! - Both are plain instances built once by the host and shared by clone;
//!   there is no global state. The progress registry belongs to the executor.
//! - Every call has a blocking form and a callback form that runs on a
//!   worker thread.

pub mod client;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod executor;
pub mod http;
pub mod progress;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::{decode, into_parts, ApiClient};
pub use config::ClientConfig;
pub use connectivity::{AlwaysConnected, Connectivity, Reachability};
pub use error::{ApiError, ServiceError};
pub use executor::{encode_url, Headers, InFlight, Params, RequestExecutor};
pub use http::{HttpRequest, RawResponse, RequestMethod, TransferReceipt};
pub use progress::{OperationId, ProgressHandler, ProgressRegistry};
pub use transport::{Transport, UreqTransport};
pub use types::{AccessTokenResponse, AuthResponse, AuthTokens};
