//! Typed request layer: execute, decode, classify.
//!
//! # Design
//! `ApiClient` wraps a `RequestExecutor` and turns each `RawResponse` into
//! either a value of the caller's schema type or an `ApiError`. The order of
//! the decode attempts is fixed:
//!
//! 1. decode as the schema; success only if that works *and* status is 200,
//! 2. otherwise decode as `ServiceError` and report its description,
//! 3. otherwise report an unknown parse error.
//!
//! Because the schema is tried first, a 200 body that happens to fit both the
//! schema and `ServiceError` is a success.

use serde::de::DeserializeOwned;

use crate::error::{ApiError, ServiceError};
use crate::executor::{InFlight, Params, RequestExecutor};
use crate::http::{RawResponse, RequestMethod};

const TARGET: &str = "api_core::client";

/// Generic, schema-driven client over a `RequestExecutor`.
#[derive(Clone)]
pub struct ApiClient {
    executor: RequestExecutor,
}

impl ApiClient {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Execute and decode on the current thread.
    pub fn load_blocking<T: DeserializeOwned>(
        &self,
        path: &str,
        method: RequestMethod,
        params: Option<&Params>,
    ) -> Result<T, ApiError> {
        let response = self.executor.execute_blocking(path, method, params, None)?;
        decode(&response)
    }

    /// Execute and decode on a worker thread; `on_completion` receives the
    /// typed value or the classified error.
    pub fn load<T, F>(&self, path: &str, method: RequestMethod, params: Option<Params>, on_completion: F) -> InFlight
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<T, ApiError>) + Send + 'static,
    {
        self.executor
            .execute(path, method, params, None, move |result| {
                on_completion(result.and_then(|response| decode(&response)));
            })
    }

    /// `load` with the two-slot callback shape: exactly one of value and
    /// message is `Some`.
    pub fn load_with_message<T, F>(
        &self,
        path: &str,
        method: RequestMethod,
        params: Option<Params>,
        on_completion: F,
    ) -> InFlight
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Option<T>, Option<String>) + Send + 'static,
    {
        self.load(path, method, params, move |result: Result<T, ApiError>| {
            let (value, message) = into_parts(result);
            on_completion(value, message);
        })
    }
}

/// Classify a response against schema `T`.
pub fn decode<T: DeserializeOwned>(response: &RawResponse) -> Result<T, ApiError> {
    if let Ok(value) = serde_json::from_slice::<T>(&response.body) {
        if response.status == 200 {
            return Ok(value);
        }
    }

    if let Ok(service_error) = serde_json::from_slice::<ServiceError>(&response.body) {
        tracing::warn!(
            target: TARGET,
            status = response.status,
            http_status = service_error.http_status,
            "service error: {}",
            service_error.description.as_deref().unwrap_or("")
        );
        return Err(ApiError::Service(service_error));
    }

    tracing::warn!(target: TARGET, status = response.status, "unknown parse error");
    Err(ApiError::UnknownParse)
}

/// Split a result into the (value, message) pair string-based callers expect.
pub fn into_parts<T>(result: Result<T, ApiError>) -> (Option<T>, Option<String>) {
    match result {
        Ok(value) => (Some(value), None),
        Err(err) => (None, Some(err.message())),
    }
}
