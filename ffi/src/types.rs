//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Every asynchronous call completes with one heap-allocated `FfiApiResult`
//! handed to a C callback. The envelope carries an error category, the
//! message string the core produced, a status and an optional body string.
//! Conversions from core results live here so `lib.rs` stays focused on the
//! `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use api_core::{ApiClient, ApiError, RawResponse, Reachability, RequestMethod, TransferReceipt};

/// Opaque handle to an `ApiClient` plus the reachability switch the host
/// flips when the network changes.
pub struct FfiApiClient {
    pub(crate) client: ApiClient,
    pub(crate) reachability: Reachability,
}

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiRequestMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<FfiRequestMethod> for RequestMethod {
    fn from(m: FfiRequestMethod) -> Self {
        match m {
            FfiRequestMethod::Get => RequestMethod::Get,
            FfiRequestMethod::Post => RequestMethod::Post,
            FfiRequestMethod::Put => RequestMethod::Put,
            FfiRequestMethod::Delete => RequestMethod::Delete,
        }
    }
}

/// Completion callback. Ownership of `result` passes to the callee, which
/// releases it with `api_free_result`.
pub type FfiResultCallback = extern "C" fn(result: *mut FfiApiResult, user_data: *mut c_void);

/// Upload progress callback, called with a fraction in `[0, 1]`.
pub type FfiProgressCallback = extern "C" fn(progress: f64, user_data: *mut c_void);

/// Error codes returned in `FfiApiResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NoConnectivity = 1,
    InvalidUrl = 2,
    Transport = 3,
    Service = 4,
    UnknownParse = 5,
    Filesystem = 6,
    InvalidArgument = 7,
    NullArg = 8,
    Panic = 9,
}

/// Result envelope for every call.
///
/// On success `error_code` is `Ok` and `error_message` is null. `body` holds
/// the response text for requests and is null for transfers, which report
/// the byte count in `bytes` instead. On failure `error_message` is the
/// message the core reports for that error and `http_status` is set when the
/// service supplied one.
#[repr(C)]
pub struct FfiApiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: i64,
    pub body: *mut c_char,
    pub bytes: u64,
}

impl FfiApiResult {
    fn boxed(self) -> *mut Self {
        Box::into_raw(Box::new(self))
    }

    fn success(http_status: i64, body: *mut c_char, bytes: u64) -> *mut Self {
        FfiApiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status,
            body,
            bytes,
        }
        .boxed()
    }

    fn failure(error_code: FfiErrorCode, message: &str, http_status: i64) -> *mut Self {
        FfiApiResult {
            error_code,
            error_message: c_string(message),
            http_status,
            body: std::ptr::null_mut(),
            bytes: 0,
        }
        .boxed()
    }

    pub(crate) fn from_response(response: RawResponse) -> *mut Self {
        let bytes = response.body.len() as u64;
        Self::success(i64::from(response.status), c_string(&response.text()), bytes)
    }

    pub(crate) fn from_json(value: serde_json::Value) -> *mut Self {
        let body = value.to_string();
        let bytes = body.len() as u64;
        Self::success(200, c_string(&body), bytes)
    }

    pub(crate) fn from_receipt(receipt: TransferReceipt) -> *mut Self {
        Self::success(i64::from(receipt.status), std::ptr::null_mut(), receipt.bytes)
    }

    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let error_code = match &err {
            ApiError::NoConnectivity => FfiErrorCode::NoConnectivity,
            ApiError::InvalidUrl => FfiErrorCode::InvalidUrl,
            ApiError::Transport(_) => FfiErrorCode::Transport,
            ApiError::Service(_) => FfiErrorCode::Service,
            ApiError::UnknownParse => FfiErrorCode::UnknownParse,
            ApiError::Filesystem(_) => FfiErrorCode::Filesystem,
        };
        Self::failure(error_code, &err.message(), err.http_status().unwrap_or(0))
    }

    pub(crate) fn invalid_argument(name: &str, reason: &str) -> *mut Self {
        Self::failure(FfiErrorCode::InvalidArgument, &format!("invalid argument {name}: {reason}"), 0)
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, &format!("null argument: {name}"), 0)
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, msg, 0)
    }
}

/// Caller context pointer carried to the worker thread untouched.
#[derive(Clone, Copy)]
pub(crate) struct UserData(*mut c_void);

// The pointer is only handed back to the caller's own callbacks.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub(crate) fn get(self) -> *mut c_void {
        self.0
    }
}

/// Heap C string; interior NUL bytes are dropped.
pub(crate) fn c_string(s: &str) -> *mut c_char {
    CString::new(s.replace('\0', "")).unwrap_or_default().into_raw()
}
