//! The network seam: one trait, one production implementation over `ureq`.
//!
//! # Design
//! `RequestExecutor` never talks to the network directly. It builds an
//! `HttpRequest` and passes it to a `Transport`, which performs exactly one
//! exchange and reports either a `RawResponse` (any status) or
//! `ApiError::Transport`. Status interpretation belongs to the decoder, so
//! the ureq agent is built with `http_status_as_error(false)`.

use std::io::{Read, Write};

use crate::error::ApiError;
use crate::http::{HttpRequest, RawResponse, RequestMethod, TransferReceipt};

const TARGET: &str = "api_core::transport";
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Performs HTTP exchanges on behalf of the executor.
pub trait Transport: Send + Sync {
    /// Send `request` once and capture the full response.
    fn send(&self, request: HttpRequest) -> Result<RawResponse, ApiError>;

    /// GET `url`, streaming the body into `sink`.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<TransferReceipt, ApiError>;

    /// POST everything read from `body` to `url`, streamed with chunked
    /// transfer encoding.
    fn upload(&self, url: &str, body: &mut dyn Read) -> Result<RawResponse, ApiError>;
}

/// Blocking transport backed by a shared `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<RawResponse, ApiError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let response = match method {
            RequestMethod::Get => with_headers(self.agent.get(&url), &headers).call(),
            RequestMethod::Delete => with_headers(self.agent.delete(&url), &headers).call(),
            RequestMethod::Post => {
                let builder = with_headers(self.agent.post(&url), &headers);
                match body {
                    Some(bytes) => builder.send(&bytes[..]),
                    None => builder.send_empty(),
                }
            }
            RequestMethod::Put => {
                let builder = with_headers(self.agent.put(&url), &headers);
                match body {
                    Some(bytes) => builder.send(&bytes[..]),
                    None => builder.send_empty(),
                }
            }
        }
        .map_err(transport_error)?;

        into_raw_response(response)
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<TransferReceipt, ApiError> {
        let mut response = self.agent.get(url).call().map_err(transport_error)?;
        let status = response.status().as_u16();
        let mut reader = response.body_mut().as_reader();
        let bytes = copy_stream(&mut reader, sink)?;
        Ok(TransferReceipt { status, bytes })
    }

    fn upload(&self, url: &str, body: &mut dyn Read) -> Result<RawResponse, ApiError> {
        tracing::debug!(target: TARGET, url, "streaming upload");
        let response = self
            .agent
            .post(url)
            .send(ureq::SendBody::from_reader(body))
            .map_err(transport_error)?;
        into_raw_response(response)
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn into_raw_response(mut response: ureq::http::Response<ureq::Body>) -> Result<RawResponse, ApiError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    // No size cap: any completed exchange is handed back whole.
    let body = response
        .body_mut()
        .with_config()
        .limit(u64::MAX)
        .read_to_vec()
        .map_err(transport_error)?;
    Ok(RawResponse {
        status,
        headers,
        body,
    })
}

fn transport_error(err: ureq::Error) -> ApiError {
    tracing::warn!(target: TARGET, "transport failure: {err}");
    ApiError::Transport(err.to_string())
}

/// Copy `reader` into `sink`, keeping the two failure sides apart: a read
/// error is a transport failure, a write error is a filesystem failure.
pub(crate) fn copy_stream(reader: &mut dyn Read, sink: &mut dyn Write) -> Result<u64, ApiError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(ApiError::Transport(err.to_string())),
        };
        sink.write_all(&buf[..n])?;
        total += n as u64;
    }
    sink.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            self.served = true;
            buf[..3].copy_from_slice(b"abc");
            Ok(3)
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn copy_stream_counts_bytes() {
        let mut out = Vec::new();
        let n = copy_stream(&mut &b"hello world"[..], &mut out).unwrap();
        assert_eq!(n, 11);
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn read_failure_is_transport_error() {
        let mut out = Vec::new();
        let err = copy_stream(&mut FailingReader { served: false }, &mut out).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(err.to_string(), "error connection reset");
    }

    #[test]
    fn write_failure_is_filesystem_error() {
        let err = copy_stream(&mut &b"data"[..], &mut FullDisk).unwrap_err();
        assert!(matches!(err, ApiError::Filesystem(_)));
        assert_eq!(err.to_string(), "disk full");
    }

    /// Serve one canned HTTP/1.1 response on a random port.
    fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
        use std::io::{BufRead, BufReader};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let mut stream = stream;
            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
        });
        format!("http://{addr}/big")
    }

    #[test]
    fn large_body_is_returned_whole() {
        let size = 11 * 1024 * 1024;
        let url = serve_once("200 OK", vec![b'x'; size]);
        let request = HttpRequest {
            method: RequestMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
        };
        let response = UreqTransport::new().send(request).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.len(), size);
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let transport = UreqTransport::new();
        let request = HttpRequest {
            method: RequestMethod::Get,
            url: "http://127.0.0.1:9/unreachable".to_string(),
            headers: Vec::new(),
            body: None,
        };
        let err = transport.send(request).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(err.to_string().starts_with("error "));
    }
}
