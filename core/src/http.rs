//! HTTP transport types shared by the executor, the decoder and transports.
//!
//! # Design
//! Requests and responses are plain data. `RequestExecutor` builds an
//! `HttpRequest`, hands it to a `Transport`, and gets a `RawResponse` back.
//! Nothing here performs I/O, so the request-building rules can be tested
//! without a network.
//!
//! All fields use owned types (`String`, `Vec`) so values can move onto
//! worker threads and across the FFI boundary without lifetime concerns.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RequestMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
        }
    }

    /// Whether request params travel as a JSON body for this method.
    pub fn carries_body(self) -> bool {
        matches!(self, RequestMethod::Post | RequestMethod::Put)
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Built by `RequestExecutor::build_request`. `url` is already percent-encoded and
/// validated, and `headers` already has the defaults merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: RequestMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Case-insensitive header lookup. Later entries win.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A completed HTTP exchange: status, headers and the raw body bytes.
///
/// Any status is a `RawResponse`; 4xx/5xx are classified later by the
/// decoder, never by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Body as UTF-8 text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Outcome of a finished download or upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub status: u16,
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_post_and_put_carry_a_body() {
        assert!(RequestMethod::Post.carries_body());
        assert!(RequestMethod::Put.carries_body());
        assert!(!RequestMethod::Get.carries_body());
        assert!(!RequestMethod::Delete.carries_body());
    }

    #[test]
    fn header_lookup_ignores_case_and_prefers_last() {
        let req = HttpRequest {
            method: RequestMethod::Get,
            url: "http://localhost/".to_string(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("accept".to_string(), "text/plain".to_string()),
            ],
            body: None,
        };
        assert_eq!(req.header("ACCEPT"), Some("text/plain"));
        assert_eq!(req.header("x-missing"), None);
    }
}
