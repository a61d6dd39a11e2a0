//! Progress-handler registry for in-flight uploads.
//!
//! # Design
//! The registry is the only mutable state shared between concurrent
//! transfers. It lives behind a single `parking_lot::Mutex` and is owned by
//! the `RequestExecutor` that issues the ids, so two executors never collide.
//! A handler is registered before its upload is dispatched and removed once
//! the upload completes.
//!
//! Handlers are cloned out of the lock before being invoked, so a handler
//! may itself touch the registry without deadlocking.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback receiving upload progress as a fraction in `[0.0, 1.0]`.
pub type ProgressHandler = Arc<dyn Fn(f64) + Send + Sync>;

/// Identifier of one in-flight transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OperationId(u64);

impl OperationId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

struct Entry {
    handler: ProgressHandler,
    last: f64,
}

/// Maps operation ids to their progress handlers.
#[derive(Clone, Default)]
pub struct ProgressRegistry {
    next_id: Arc<AtomicU64>,
    handlers: Arc<Mutex<HashMap<OperationId, Entry>>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler` under a fresh id.
    pub fn register(&self, handler: ProgressHandler) -> OperationId {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.handlers.lock().insert(id, Entry { handler, last: 0.0 });
        id
    }

    /// Report `bytes_sent` of `total_bytes` for `id`.
    ///
    /// Returns the fraction delivered to the handler, or `None` when nothing
    /// fired: unknown id, `total_bytes == 0`, or a value lower than one
    /// already reported.
    pub fn report(&self, id: OperationId, bytes_sent: u64, total_bytes: u64) -> Option<f64> {
        if total_bytes == 0 {
            return None;
        }
        let progress = (bytes_sent as f64 / total_bytes as f64).clamp(0.0, 1.0);
        let handler = {
            let mut handlers = self.handlers.lock();
            let entry = handlers.get_mut(&id)?;
            if progress < entry.last {
                return None;
            }
            entry.last = progress;
            Arc::clone(&entry.handler)
        };
        handler(progress);
        Some(progress)
    }

    /// Drop the handler for a finished transfer.
    pub fn remove(&self, id: OperationId) -> bool {
        self.handlers.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.handlers.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }
}

impl fmt::Debug for ProgressRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressRegistry")
            .field("in_flight", &self.len())
            .finish()
    }
}

/// Reader that reports progress to a `ProgressRegistry` once per
/// `chunk_size` bytes handed out, plus once at `total`.
///
/// A `read` never crosses a chunk boundary, so events land exactly on
/// multiples of `chunk_size` whatever buffer size the caller uses.
pub struct ProgressReader<R> {
    inner: R,
    registry: ProgressRegistry,
    id: OperationId,
    sent: u64,
    total: u64,
    chunk_size: usize,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, registry: ProgressRegistry, id: OperationId, total: u64, chunk_size: usize) -> Self {
        Self {
            inner,
            registry,
            id,
            sent: 0,
            total,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = self.chunk_size as u64;
        let to_boundary = chunk - self.sent % chunk;
        let limit = buf.len().min(to_boundary as usize);
        let n = self.inner.read(&mut buf[..limit])?;
        if n > 0 {
            self.sent += n as u64;
            if self.sent % chunk == 0 || self.sent >= self.total {
                self.registry.report(self.id, self.sent, self.total);
            }
        }
        Ok(n)
    }
}
