//! Local preview references for in-flight uploads.
//!
//! A [`PreviewRegistry`] hands out `preview://` URLs backed by the raw bytes
//! of a submitted file so the presentation layer can show the file before the
//! backend has confirmed it. Each URL is owned by exactly one
//! [`PreviewHandle`]; dropping the handle releases the URL and the bytes.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::media::UploadFile;

const PREVIEW_SCHEME: &str = "preview://";

#[derive(Default)]
struct RegistryInner {
    entries: Mutex<HashMap<String, Arc<[u8]>>>,
    created: AtomicU64,
    released: AtomicU64,
}

/// Per-widget table of live preview references.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<RegistryInner>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the file bytes and return the owning handle.
    pub fn create(&self, file: &UploadFile) -> PreviewHandle {
        let url = format!("{PREVIEW_SCHEME}{}", uuid::Uuid::new_v4());
        self.inner
            .entries
            .lock()
            .insert(url.clone(), Arc::clone(&file.data));
        self.inner.created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(url = %url, file = %file.name, "Preview reference created");
        PreviewHandle {
            url,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Bytes behind a live preview URL.
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        self.inner.entries.lock().get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn created_count(&self) -> u64 {
        self.inner.created.load(Ordering::Relaxed)
    }

    pub fn released_count(&self) -> u64 {
        self.inner.released.load(Ordering::Relaxed)
    }
}

/// Owner of one preview URL. Not `Clone`: release happens once, on drop.
pub struct PreviewHandle {
    url: String,
    registry: Arc<RegistryInner>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle").field("url", &self.url).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if self.registry.entries.lock().remove(&self.url).is_some() {
            self.registry.released.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(url = %self.url, "Preview reference released");
        } else {
            tracing::warn!(url = %self.url, "Preview reference was already gone on release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_resolves_until_dropped() {
        let registry = PreviewRegistry::new();
        let file = UploadFile::new("a.png", vec![7u8, 8, 9]);
        let handle = registry.create(&file);
        assert!(handle.url().starts_with("preview://"));
        assert_eq!(registry.resolve(handle.url()).as_deref(), Some(&[7u8, 8, 9][..]));

        let url = handle.url().to_string();
        drop(handle);
        assert!(registry.resolve(&url).is_none());
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.released_count(), 1);
    }

    #[test]
    fn registries_are_isolated() {
        let a = PreviewRegistry::new();
        let b = PreviewRegistry::new();
        let handle = a.create(&UploadFile::new("x.png", vec![1u8]));
        assert!(b.resolve(handle.url()).is_none());
        assert_eq!(b.live_count(), 0);
        assert_eq!(a.live_count(), 1);
    }

    #[test]
    fn each_handle_gets_a_distinct_url() {
        let registry = PreviewRegistry::new();
        let file = UploadFile::new("x.png", vec![1u8]);
        let first = registry.create(&file);
        let second = registry.create(&file);
        assert_ne!(first.url(), second.url());
        assert_eq!(registry.created_count(), 2);
    }
}
