//! The image cache port and an in-memory double for tests.

use async_trait::async_trait;
use chrono::Utc;
use sessionctl_types::{ImageCacheEntry, SessionCtlResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Looks up, refreshes, and best-effort writes `ImageCacheEntry` rows keyed
/// by content hash. A failed `put` must never fail the resolve, callers
/// treat its `Err` as a log-and-continue signal, never propagate it.
#[async_trait]
pub trait ImageCache: Send + Sync {
    async fn get(&self, hash: &str) -> SessionCtlResult<Option<ImageCacheEntry>>;

    /// Refresh `lastUsedAt` out-of-band. Does not change `createdAt`.
    async fn touch(&self, hash: &str) -> SessionCtlResult<()>;

    /// Insert `(hash, baseImage, tag)` if absent. A conflict on `hash` is a
    /// no-op, not an error.
    async fn put(&self, hash: &str, base_image: &str, registry_tag: &str) -> SessionCtlResult<()>;
}

/// An in-process cache double, used by tests and by `sessionctl-api` when
/// no database is configured.
#[derive(Default)]
pub struct InMemoryImageCache {
    entries: Mutex<HashMap<String, ImageCacheEntry>>,
}

impl InMemoryImageCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageCache for InMemoryImageCache {
    async fn get(&self, hash: &str) -> SessionCtlResult<Option<ImageCacheEntry>> {
        Ok(self.entries.lock().unwrap().get(hash).cloned())
    }

    async fn touch(&self, hash: &str) -> SessionCtlResult<()> {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(hash) {
            entry.last_used_at = Utc::now();
        }
        Ok(())
    }

    async fn put(&self, hash: &str, base_image: &str, registry_tag: &str) -> SessionCtlResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.entry(hash.to_string()).or_insert_with(|| {
            let now = Utc::now();
            ImageCacheEntry {
                hash: hash.to_string(),
                base_image: base_image.to_string(),
                registry_tag: registry_tag.to_string(),
                created_at: now,
                last_used_at: now,
            }
        });
        Ok(())
    }
}
