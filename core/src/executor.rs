//! Request execution: connectivity gate, URL checks, dispatch, transfers.
//!
//! # Design
//! `RequestExecutor` is an explicit instance built once at startup and cloned
//! into whatever needs it; clones share the transport, the reachability
//! signal and the progress registry. Each call has a blocking form
//! (`*_blocking`) that does the work on the current thread, and a callback
//! form that runs the blocking form on a fresh worker thread and hands the
//! result to the completion closure there. The callback is always invoked
//! exactly once.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::config::ClientConfig;
use crate::connectivity::Connectivity;
use crate::error::ApiError;
use crate::http::{HttpRequest, RawResponse, RequestMethod, TransferReceipt};
use crate::progress::{OperationId, ProgressHandler, ProgressReader, ProgressRegistry};
use crate::transport::{Transport, UreqTransport};

const TARGET: &str = "api_core::executor";

/// JSON object sent as the body of POST/PUT requests.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Header list; later entries override earlier ones with the same name.
pub type Headers = Vec<(String, String)>;

/// Bytes left as-is when escaping a request path: alphanumerics and
/// `!$&'()*+,-./:;=?@_~`, the same set query strings allow.
const QUERY_ALLOWED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Handle to work running on a worker thread.
#[derive(Debug)]
pub struct InFlight {
    operation: Option<OperationId>,
    worker: Option<JoinHandle<()>>,
}

impl InFlight {
    /// Registry id of the upload, if this is one.
    pub fn operation(&self) -> Option<OperationId> {
        self.operation
    }

    /// Block until the completion callback has returned.
    pub fn wait(self) {
        if let Some(worker) = self.worker {
            if worker.join().is_err() {
                tracing::error!(target: TARGET, "worker thread panicked");
            }
        }
    }
}

/// Issues requests and file transfers against a `Transport`.
#[derive(Clone)]
pub struct RequestExecutor {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn Connectivity>,
    progress: ProgressRegistry,
}

impl RequestExecutor {
    /// Executor with a fresh progress registry of its own.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, connectivity: Arc<dyn Connectivity>) -> Self {
        Self::with_registry(config, transport, connectivity, ProgressRegistry::new())
    }

    /// Executor reporting upload progress into `progress`, which the host
    /// may share with other components.
    pub fn with_registry(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        connectivity: Arc<dyn Connectivity>,
        progress: ProgressRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            connectivity,
            progress,
        }
    }

    /// Executor over a default `UreqTransport`.
    pub fn with_ureq(config: ClientConfig, connectivity: Arc<dyn Connectivity>) -> Self {
        Self::new(config, Arc::new(UreqTransport::new()), connectivity)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn progress(&self) -> &ProgressRegistry {
        &self.progress
    }

    /// Turn a path, method, params and headers into a ready-to-send request.
    ///
    /// Params become a JSON body only for POST and PUT. A params map that
    /// fails to serialize yields an empty body rather than an error.
    pub fn build_request(
        &self,
        path: &str,
        method: RequestMethod,
        params: Option<&Params>,
        headers: Option<&[(String, String)]>,
    ) -> Result<HttpRequest, ApiError> {
        let url = encode_url(&self.config.resolve(path))?;

        let mut merged = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        merge_headers(&mut merged, &self.config.headers);
        if let Some(headers) = headers {
            merge_headers(&mut merged, headers);
        }

        let body = if method.carries_body() {
            params.map(encode_params)
        } else {
            None
        };

        Ok(HttpRequest {
            method,
            url,
            headers: merged,
            body,
        })
    }

    /// Run one request on the current thread.
    ///
    /// Any completed exchange is `Ok`, whatever its status.
    pub fn execute_blocking(
        &self,
        path: &str,
        method: RequestMethod,
        params: Option<&Params>,
        headers: Option<&[(String, String)]>,
    ) -> Result<RawResponse, ApiError> {
        if !self.connectivity.is_connected() {
            tracing::warn!(target: TARGET, %method, path, "no network, request not sent");
            return Err(ApiError::NoConnectivity);
        }

        let request = self.build_request(path, method, params, headers)?;
        tracing::debug!(target: TARGET, %method, url = %request.url, "dispatching request");

        let response = self.transport.send(request)?;
        tracing::debug!(target: TARGET, %method, path, status = response.status, "response received");
        Ok(response)
    }

    /// Run one request on a worker thread and pass the result to
    /// `on_completion`.
    pub fn execute<F>(
        &self,
        path: &str,
        method: RequestMethod,
        params: Option<Params>,
        headers: Option<Headers>,
        on_completion: F,
    ) -> InFlight
    where
        F: FnOnce(Result<RawResponse, ApiError>) + Send + 'static,
    {
        let executor = self.clone();
        let path = path.to_string();
        self.spawn(None, move || {
            let result = executor.execute_blocking(&path, method, params.as_ref(), headers.as_deref());
            on_completion(result);
        })
    }

    /// Stream `source_url` into a temporary file beside `destination`, then
    /// move it into place.
    ///
    /// A failed transfer or a failed move leaves nothing at `destination`;
    /// the temporary file is deleted either way. A completed exchange with
    /// any status is written out and its status returned in the receipt.
    pub fn download_blocking(&self, source_url: &str, destination: &Path) -> Result<TransferReceipt, ApiError> {
        let url = encode_url(&self.config.resolve(source_url))?;
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(dir)?;
        tracing::debug!(target: TARGET, %url, temp = %temp.path().display(), "downloading");

        let receipt = self.transport.download(&url, temp.as_file_mut())?;

        temp.persist(destination).map_err(|err| {
            tracing::warn!(
                target: TARGET,
                destination = %destination.display(),
                "error writing file: {}",
                err.error
            );
            ApiError::Filesystem(err.error)
        })?;

        tracing::info!(
            target: TARGET,
            %url,
            status = receipt.status,
            bytes = receipt.bytes,
            "download finished"
        );
        Ok(receipt)
    }

    /// Download on a worker thread.
    pub fn download<F>(&self, source_url: &str, destination: impl Into<PathBuf>, on_completion: F) -> InFlight
    where
        F: FnOnce(Result<TransferReceipt, ApiError>) + Send + 'static,
    {
        let executor = self.clone();
        let url = source_url.to_string();
        let destination = destination.into();
        self.spawn(None, move || {
            on_completion(executor.download_blocking(&url, &destination));
        })
    }

    /// POST the file at `source` to `target_url` on the current thread,
    /// reporting progress to `on_progress`.
    pub fn upload_blocking(
        &self,
        source: &Path,
        target_url: &str,
        on_progress: ProgressHandler,
    ) -> Result<TransferReceipt, ApiError> {
        let id = self.progress.register(on_progress);
        self.run_upload(id, source, target_url)
    }

    /// Upload on a worker thread. The progress handler is registered before
    /// this returns; its id is available from the returned `InFlight`.
    pub fn upload<P, F>(&self, source: impl Into<PathBuf>, target_url: &str, on_progress: P, on_completion: F) -> InFlight
    where
        P: Fn(f64) + Send + Sync + 'static,
        F: FnOnce(Result<TransferReceipt, ApiError>) + Send + 'static,
    {
        let id = self.progress.register(Arc::new(on_progress));
        let executor = self.clone();
        let source = source.into();
        let url = target_url.to_string();
        self.spawn(Some(id), move || {
            on_completion(executor.run_upload(id, &source, &url));
        })
    }

    fn run_upload(&self, id: OperationId, source: &Path, target_url: &str) -> Result<TransferReceipt, ApiError> {
        let result = self.stream_file(id, source, target_url);
        self.progress.remove(id);
        match &result {
            Ok(receipt) => tracing::info!(
                target: TARGET,
                operation = %id,
                status = receipt.status,
                bytes = receipt.bytes,
                "upload finished"
            ),
            Err(err) => tracing::warn!(target: TARGET, operation = %id, "upload failed: {err}"),
        }
        result
    }

    fn stream_file(&self, id: OperationId, source: &Path, target_url: &str) -> Result<TransferReceipt, ApiError> {
        let url = encode_url(&self.config.resolve(target_url))?;
        let file = File::open(source)?;
        let total = file.metadata()?.len();

        let mut reader = ProgressReader::new(file, self.progress.clone(), id, total, self.config.upload_chunk_size);
        let response = self.transport.upload(&url, &mut reader)?;
        Ok(TransferReceipt {
            status: response.status,
            bytes: reader.bytes_sent(),
        })
    }

    /// Run `task` on a named worker thread. If the thread cannot be started
    /// the task runs inline so its callback still fires.
    fn spawn<T>(&self, operation: Option<OperationId>, task: T) -> InFlight
    where
        T: FnOnce() + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Some(task)));
        let worker_slot = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name(self.config.worker_name.clone())
            .spawn(move || {
                let task = worker_slot.lock().take();
                if let Some(task) = task {
                    task();
                }
            });

        match spawned {
            Ok(worker) => InFlight {
                operation,
                worker: Some(worker),
            },
            Err(err) => {
                tracing::error!(target: TARGET, "failed to start worker thread, running inline: {err}");
                let task = slot.lock().take();
                if let Some(task) = task {
                    task();
                }
                InFlight {
                    operation,
                    worker: None,
                }
            }
        }
    }
}

/// Percent-encode `raw` and check that it forms an absolute URL with a host.
pub fn encode_url(raw: &str) -> Result<String, ApiError> {
    let escaped = utf8_percent_encode(raw, QUERY_ALLOWED).to_string();
    match Url::parse(&escaped) {
        Ok(url) if url.has_host() => Ok(url.into()),
        Ok(_) => {
            tracing::warn!(target: TARGET, url = %escaped, "URL has no host");
            Err(ApiError::InvalidUrl)
        }
        Err(err) => {
            tracing::warn!(target: TARGET, url = %escaped, "URL is not valid: {err}");
            Err(ApiError::InvalidUrl)
        }
    }
}

fn merge_headers(merged: &mut Headers, extra: &[(String, String)]) {
    for (name, value) in extra {
        merged.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        merged.push((name.clone(), value.clone()));
    }
}

fn encode_params(params: &Params) -> Vec<u8> {
    match serde_json::to_vec(params) {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(target: TARGET, "failed to serialize request params, sending empty body: {err}");
            Vec::new()
        }
    }
}
