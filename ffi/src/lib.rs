//! C-ABI wrapper around `api-core`.
//!
//! # Overview
//! Exposes the request layer to the mobile host through `extern "C"`
//! functions: generic requests, the JSON decode pipeline, file downloads and
//! uploads with progress, and the reachability switch.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Calls return immediately; the work runs on a core worker thread and the
//!   completion callback fires there exactly once with an `FfiApiResult`.
//! - Argument errors are reported through the same callback, synchronously,
//!   and the call returns `false`.
//! - The callee owns every result pointer it receives and must release it
//!   with `api_free_result`.

pub mod types;

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use api_core::{ApiClient, ApiError, ClientConfig, Params, Reachability, RequestExecutor};

use types::*;

const TARGET: &str = "api_ffi";

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a new client bound to `base_url`. Relative paths passed to the
/// request functions are joined onto it.
///
/// Returns null if `base_url` is null or if an internal panic occurs.
/// The caller must free the returned pointer with `api_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn api_client_new(base_url: *const c_char) -> *mut FfiApiClient {
    catch_unwind(|| {
        if base_url.is_null() {
            return std::ptr::null_mut();
        }
        let url = unsafe { CStr::from_ptr(base_url) }.to_str().unwrap_or("");
        let reachability = Reachability::default();
        let config = ClientConfig::from_env().with_base_url(url);
        let executor = RequestExecutor::with_ureq(config, Arc::new(reachability.clone()));
        let handle = FfiApiClient {
            client: ApiClient::new(executor),
            reachability,
        };
        Box::into_raw(Box::new(handle))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `api_client_new`. Safe to call with null.
///
/// Work already dispatched keeps its own reference and still completes.
#[unsafe(no_mangle)]
pub extern "C" fn api_client_free(client: *mut FfiApiClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

/// Report a reachability change from the host. While disconnected, requests
/// fail with "No Internet Connection" without touching the network.
#[unsafe(no_mangle)]
pub extern "C" fn api_client_set_connected(client: *const FfiApiClient, connected: bool) {
    if client.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let client = unsafe { &*client };
        client.reachability.set_connected(connected);
    }));
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Send a request and deliver the raw status and body text.
///
/// `params_json` may be null; otherwise it must be a JSON object, sent as
/// the body for POST and PUT. Any completed exchange is reported with
/// `error_code = Ok` whatever its status.
///
/// Returns `true` once the request is dispatched. Returns `false` if
/// `callback` is null, or after reporting an argument error through it.
#[unsafe(no_mangle)]
pub extern "C" fn api_execute(
    client: *const FfiApiClient,
    method: FfiRequestMethod,
    path: *const c_char,
    params_json: *const c_char,
    callback: Option<FfiResultCallback>,
    user_data: *mut c_void,
) -> bool {
    let Some(callback) = callback else {
        return false;
    };
    let user_data = UserData::new(user_data);

    let dispatched = catch_unwind(AssertUnwindSafe(|| -> Result<(), *mut FfiApiResult> {
        let client = client_ref(client)?;
        let path = string_arg(path, "path")?;
        let params = params_arg(params_json)?;

        client
            .client
            .executor()
            .execute(&path, method.into(), params, None, move |result| {
                let out = match result {
                    Ok(response) => FfiApiResult::from_response(response),
                    Err(err) => FfiApiResult::from_error(err),
                };
                callback(out, user_data.get());
            });
        Ok(())
    }));
    settle(dispatched, callback, user_data, "api_execute")
}

/// Send a request and run the decode pipeline with any JSON value as the
/// schema.
///
/// A 200 response with a JSON body delivers that JSON re-serialized in
/// `body`. Anything else delivers the classified error: the service
/// description, "unknown parse error", or a connectivity, URL or transport
/// message.
#[unsafe(no_mangle)]
pub extern "C" fn api_load_json(
    client: *const FfiApiClient,
    method: FfiRequestMethod,
    path: *const c_char,
    params_json: *const c_char,
    callback: Option<FfiResultCallback>,
    user_data: *mut c_void,
) -> bool {
    let Some(callback) = callback else {
        return false;
    };
    let user_data = UserData::new(user_data);

    let dispatched = catch_unwind(AssertUnwindSafe(|| -> Result<(), *mut FfiApiResult> {
        let client = client_ref(client)?;
        let path = string_arg(path, "path")?;
        let params = params_arg(params_json)?;

        client.client.load(
            &path,
            method.into(),
            params,
            move |result: Result<serde_json::Value, ApiError>| {
                let out = match result {
                    Ok(value) => FfiApiResult::from_json(value),
                    Err(err) => FfiApiResult::from_error(err),
                };
                callback(out, user_data.get());
            },
        );
        Ok(())
    }));
    settle(dispatched, callback, user_data, "api_load_json")
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

/// Download `url` into `dest_path`, replacing any existing file.
///
/// On success `http_status` is the response status and `bytes` the number of
/// bytes written.
#[unsafe(no_mangle)]
pub extern "C" fn api_download(
    client: *const FfiApiClient,
    url: *const c_char,
    dest_path: *const c_char,
    callback: Option<FfiResultCallback>,
    user_data: *mut c_void,
) -> bool {
    let Some(callback) = callback else {
        return false;
    };
    let user_data = UserData::new(user_data);

    let dispatched = catch_unwind(AssertUnwindSafe(|| -> Result<(), *mut FfiApiResult> {
        let client = client_ref(client)?;
        let url = string_arg(url, "url")?;
        let destination = PathBuf::from(string_arg(dest_path, "dest_path")?);

        client
            .client
            .executor()
            .download(&url, destination, move |result| {
                let out = match result {
                    Ok(receipt) => FfiApiResult::from_receipt(receipt),
                    Err(err) => FfiApiResult::from_error(err),
                };
                callback(out, user_data.get());
            });
        Ok(())
    }));
    settle(dispatched, callback, user_data, "api_download")
}

/// Upload the file at `src_path` to `url`.
///
/// `progress` may be null. When set it is called on the worker thread with
/// non-decreasing fractions, ending at 1.0 once every byte has been sent.
/// It is never called after `callback`.
#[unsafe(no_mangle)]
pub extern "C" fn api_upload(
    client: *const FfiApiClient,
    src_path: *const c_char,
    url: *const c_char,
    progress: Option<FfiProgressCallback>,
    callback: Option<FfiResultCallback>,
    user_data: *mut c_void,
) -> bool {
    let Some(callback) = callback else {
        return false;
    };
    let user_data = UserData::new(user_data);

    let dispatched = catch_unwind(AssertUnwindSafe(|| -> Result<(), *mut FfiApiResult> {
        let client = client_ref(client)?;
        let source = PathBuf::from(string_arg(src_path, "src_path")?);
        let url = string_arg(url, "url")?;

        client.client.executor().upload(
            source,
            &url,
            move |fraction: f64| {
                if let Some(progress) = progress {
                    progress(fraction, user_data.get());
                }
            },
            move |result| {
                let out = match result {
                    Ok(receipt) => FfiApiResult::from_receipt(receipt),
                    Err(err) => FfiApiResult::from_error(err),
                };
                callback(out, user_data.get());
            },
        );
        Ok(())
    }));
    settle(dispatched, callback, user_data, "api_upload")
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn client_ref<'a>(client: *const FfiApiClient) -> Result<&'a FfiApiClient, *mut FfiApiResult> {
    if client.is_null() {
        return Err(FfiApiResult::null_arg("client"));
    }
    Ok(unsafe { &*client })
}

fn string_arg(ptr: *const c_char, name: &str) -> Result<String, *mut FfiApiResult> {
    if ptr.is_null() {
        return Err(FfiApiResult::null_arg(name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_string)
        .map_err(|_| FfiApiResult::invalid_argument(name, "not valid UTF-8"))
}

fn params_arg(ptr: *const c_char) -> Result<Option<Params>, *mut FfiApiResult> {
    if ptr.is_null() {
        return Ok(None);
    }
    let raw = string_arg(ptr, "params_json")?;
    serde_json::from_str::<Params>(&raw)
        .map(Some)
        .map_err(|err| FfiApiResult::invalid_argument("params_json", &err.to_string()))
}

/// Turn the outcome of a dispatch attempt into the return value, reporting
/// argument errors and panics through `callback`.
fn settle(
    dispatched: std::thread::Result<Result<(), *mut FfiApiResult>>,
    callback: FfiResultCallback,
    user_data: UserData,
    function: &str,
) -> bool {
    match dispatched {
        Ok(Ok(())) => true,
        Ok(Err(result)) => {
            tracing::warn!(target: TARGET, function, "rejected call");
            callback(result, user_data.get());
            false
        }
        Err(_) => {
            tracing::error!(target: TARGET, function, "panic while dispatching");
            callback(FfiApiResult::panic(&format!("panic in {function}")), user_data.get());
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiApiResult` delivered to a callback. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn api_free_result(result: *mut FfiApiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.body.is_null() {
            drop(unsafe { CString::from_raw(result.body) });
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn api_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
