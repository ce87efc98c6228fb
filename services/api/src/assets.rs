//! services/api/src/assets.rs
//!
//! Policy layer over the raw `ObjectStore` port: bounded retry for download
//! URLs (transient authorization/CORS failures are retryable, a missing
//! object is not) and partial-failure-tolerant bulk deletion.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use storyincolor_core::domain::StoredObject;
use storyincolor_core::ports::{ObjectStore, PortError, PortResult, ProgressFn};
use tracing::{info, warn};

/// Default retry budget for URL retrieval, matching the client behavior the
/// storefront shipped with.
pub const DEFAULT_URL_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct AssetService {
    store: Arc<dyn ObjectStore>,
    url_attempts: u32,
    retry_base: Duration,
}

impl AssetService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            url_attempts: DEFAULT_URL_ATTEMPTS,
            retry_base: DEFAULT_RETRY_BASE,
        }
    }

    pub fn with_retry(mut self, attempts: u32, base: Duration) -> Self {
        self.url_attempts = attempts.max(1);
        self.retry_base = base;
        self
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        on_progress: Option<&ProgressFn>,
    ) -> PortResult<StoredObject> {
        self.store.upload(path, bytes, content_type, on_progress).await
    }

    /// Retrieve a download URL with retry and fixed+linear backoff
    /// (base × attempt). A definitive "object does not exist" failure is
    /// returned immediately; retrying cannot help.
    pub async fn download_url(&self, path: &str) -> PortResult<String> {
        if path.is_empty() {
            return Err(PortError::Validation("No image path provided".to_string()));
        }

        let mut last_error = None;
        for attempt in 0..self.url_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry_base * attempt).await;
            }
            match self.store.download_url(path).await {
                Ok(url) => return Ok(url),
                Err(err) if err.is_not_found() => return Err(err),
                Err(err) => {
                    warn!(path, attempt = attempt + 1, error = %err, "Failed to get download URL");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| PortError::Unexpected("Failed to get download URL".to_string())))
    }

    pub async fn delete(&self, path: &str) -> PortResult<()> {
        self.store.delete(path).await
    }

    /// Best-effort deletion of an explicit path list. Individual failures are
    /// logged and do not abort the remainder. Returns how many were deleted.
    pub async fn delete_many(&self, paths: &[String]) -> usize {
        let deletions = paths.iter().map(|path| {
            let store = self.store.clone();
            async move {
                match store.delete(path).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(path = path.as_str(), error = %err, "Could not delete file");
                        false
                    }
                }
            }
        });
        let results = join_all(deletions).await;
        let deleted = results.into_iter().filter(|ok| *ok).count();
        info!(deleted, total = paths.len(), "Storage cleanup complete");
        deleted
    }

    /// Recursively delete everything under a prefix, tolerating partial failure.
    pub async fn delete_all(&self, prefix: &str) -> PortResult<usize> {
        let paths = self.store.list(prefix).await?;
        Ok(self.delete_many(&paths).await)
    }
}
