//! Process-wide media metadata cache.
//!
//! Each canonical URL is loaded at most once successfully; the first
//! successful load wins and is never invalidated. Failures are not cached.
//! Concurrent misses on the same URL each perform their own load.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use renderforged_common::{MediaLoadError, MediaLoadErrorKind};
use tracing::{debug, warn};

use super::loader::{MediaMetadata, MetadataLoader};

/// Default bound on a single metadata load.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(8);

/// Default measured-vs-expected duration drift before warning.
pub const DEFAULT_DURATION_TOLERANCE_SECS: f64 = 0.5;

pub struct MetadataCache {
    loader: Arc<dyn MetadataLoader>,
    entries: DashMap<String, MediaMetadata>,
    timeout: Duration,
    tolerance_secs: f64,
}

impl MetadataCache {
    pub fn new(loader: Arc<dyn MetadataLoader>) -> Self {
        Self::with_limits(loader, DEFAULT_METADATA_TIMEOUT, DEFAULT_DURATION_TOLERANCE_SECS)
    }

    pub fn with_limits(
        loader: Arc<dyn MetadataLoader>,
        timeout: Duration,
        tolerance_secs: f64,
    ) -> Self {
        Self {
            loader,
            entries: DashMap::new(),
            timeout,
            tolerance_secs,
        }
    }

    /// Return metadata for `url`, loading it on a cache miss.
    ///
    /// `expected_duration` is the duration the caller configured for this
    /// media, if any. A measured duration differing by more than the
    /// tolerance only logs a warning.
    pub async fn ensure_metadata(
        &self,
        url: &str,
        expected_duration: Option<f64>,
    ) -> Result<MediaMetadata, MediaLoadError> {
        if let Some(hit) = self.entries.get(url) {
            return Ok(*hit);
        }

        debug!(url = %url, "Loading media metadata");
        let loaded = match tokio::time::timeout(self.timeout, self.loader.load(url)).await {
            Ok(Ok(meta)) => meta,
            Ok(Err(e)) => {
                warn!(url = %url, kind = %e.kind, "Media metadata load failed: {}", e.message);
                return Err(e);
            }
            Err(_elapsed) => {
                warn!(url = %url, "Media metadata load timed out after {:?}", self.timeout);
                return Err(MediaLoadError::new(
                    MediaLoadErrorKind::Timeout,
                    url,
                    format!("metadata not loaded within {:?}", self.timeout),
                ));
            }
        };

        let meta = *self.entries.entry(url.to_string()).or_insert(loaded);

        if let Some(expected) = expected_duration {
            let drift = (meta.duration_seconds - expected).abs();
            if drift > self.tolerance_secs {
                warn!(
                    url = %url,
                    expected_secs = expected,
                    measured_secs = meta.duration_seconds,
                    "Media duration differs from configured duration by {:.2}s",
                    drift
                );
            }
        }

        Ok(meta)
    }

    /// Cached entry for `url`, without loading.
    pub fn get(&self, url: &str) -> Option<MediaMetadata> {
        self.entries.get(url).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
