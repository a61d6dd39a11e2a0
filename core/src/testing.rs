//! Recording transport used by the unit tests.

use std::collections::VecDeque;
use std::io::{Read, Write};

use parking_lot::Mutex;

use crate::error::ApiError;
use crate::http::{HttpRequest, RawResponse, TransferReceipt};
use crate::transport::{copy_stream, Transport};

/// Queue-driven fake: every exchange pops the next scripted reply and is
/// recorded for later assertions.
#[derive(Default)]
pub(crate) struct MockTransport {
    replies: Mutex<VecDeque<Result<RawResponse, ApiError>>>,
    download_body: Mutex<Option<Vec<u8>>>,
    download_fails_after: Mutex<Option<usize>>,
    upload_read_size: Mutex<Option<usize>>,
    pub(crate) sent: Mutex<Vec<HttpRequest>>,
    pub(crate) downloads: Mutex<Vec<String>>,
    pub(crate) uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, status: u16, body: &str) -> Self {
        self.replies.lock().push_back(Ok(RawResponse::new(status, body)));
        self
    }

    pub(crate) fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .push_back(Err(ApiError::Transport(message.to_string())));
        self
    }

    pub(crate) fn serve_file(self, body: &[u8]) -> Self {
        *self.download_body.lock() = Some(body.to_vec());
        self
    }

    /// Write `n` bytes of the download, then fail as if the connection dropped.
    pub(crate) fn drop_download_after(self, n: usize) -> Self {
        *self.download_fails_after.lock() = Some(n);
        self
    }

    pub(crate) fn upload_read_size(self, n: usize) -> Self {
        *self.upload_read_size.lock() = Some(n);
        self
    }

    /// Number of exchanges that reached the transport.
    pub(crate) fn calls(&self) -> usize {
        self.sent.lock().len() + self.downloads.lock().len() + self.uploads.lock().len()
    }

    fn next_reply(&self) -> Result<RawResponse, ApiError> {
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no reply scripted".to_string())))
    }
}

impl Transport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<RawResponse, ApiError> {
        self.sent.lock().push(request);
        self.next_reply()
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<TransferReceipt, ApiError> {
        self.downloads.lock().push(url.to_string());
        let body = self.download_body.lock().clone().unwrap_or_default();
        if let Some(n) = *self.download_fails_after.lock() {
            sink.write_all(&body[..n.min(body.len())])?;
            return Err(ApiError::Transport("connection reset".to_string()));
        }
        let bytes = copy_stream(&mut &body[..], sink)?;
        Ok(TransferReceipt { status: 200, bytes })
    }

    fn upload(&self, url: &str, body: &mut dyn Read) -> Result<RawResponse, ApiError> {
        let read_size = self.upload_read_size.lock().unwrap_or(8 * 1024);
        let mut buf = vec![0u8; read_size];
        let mut received = Vec::new();
        loop {
            let n = body
                .read(&mut buf)
                .map_err(|err| ApiError::Transport(err.to_string()))?;
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        self.uploads.lock().push((url.to_string(), received));
        self.next_reply()
    }
}
