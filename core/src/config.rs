//! Client configuration.

use std::env;

/// Default upload read size, and therefore progress granularity.
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Settings for a `RequestExecutor`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Prefix for relative request paths. Absolute URLs bypass it.
    pub base_url: Option<String>,
    /// Extra headers applied to every `execute`, after the JSON defaults and
    /// before per-call headers.
    pub headers: Vec<(String, String)>,
    pub upload_chunk_size: usize,
    /// Thread-name prefix for worker threads.
    pub worker_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: Vec::new(),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            worker_name: "api-worker".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `API_BASE_URL` and `API_UPLOAD_CHUNK_SIZE`, keeping defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = env::var("API_BASE_URL") {
            config = config.with_base_url(&base_url);
        }
        if let Some(size) = env::var("API_UPLOAD_CHUNK_SIZE").ok().and_then(|s| s.parse().ok()) {
            config = config.with_upload_chunk_size(size);
        }
        config
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let trimmed = base_url.trim().trim_end_matches('/');
        self.base_url = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_upload_chunk_size(mut self, size: usize) -> Self {
        self.upload_chunk_size = size.max(1);
        self
    }

    pub fn with_worker_name(mut self, name: &str) -> Self {
        self.worker_name = name.to_string();
        self
    }

    /// Join `path` onto `base_url` unless `path` is already absolute.
    pub fn resolve(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) if !is_absolute(path) => {
                if path.starts_with('/') {
                    format!("{base}{path}")
                } else {
                    format!("{base}/{path}")
                }
            }
            _ => path.to_string(),
        }
    }
}

fn is_absolute(path: &str) -> bool {
    path.split_once("://")
        .is_some_and(|(scheme, _)| !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)))
}
