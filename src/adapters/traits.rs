//! Backend adapter contract consumed by the picker.
//!
//! The picker never performs I/O itself. Everything it knows about a backend
//! goes through [`MediaAdapter`], supplied by the integrating application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::media::{MediaItem, UploadFile};

/// Listing query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// One page of listing results, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub items: Vec<MediaItem>,
    pub total: u64,
    pub has_more: bool,
}

/// Errors an adapter may reject with.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The caller superseded the request. Never surfaced to users.
    #[error("request was cancelled")]
    Cancelled,

    #[error("media item not found: {0}")]
    NotFound(String),

    #[error("unsupported media: {0}")]
    Unsupported(String),

    /// Backend refused the request; message is human-readable.
    #[error("{0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AdapterError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Cooperative cancellation flag captured when a request is issued.
///
/// Cancelling does not interrupt the adapter; the picker checks the flag once
/// the call resolves and discards stale results.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True when both tokens were cloned from the same request.
    pub fn same_request(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }

    /// Convenience for adapters that poll between steps.
    pub fn check(&self) -> Result<(), AdapterError> {
        if self.is_cancelled() {
            Err(AdapterError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Progress sink handed to [`MediaAdapter::upload`]. Adapters call
/// [`report`](Self::report) zero or more times before resolving.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Option<Arc<dyn Fn(u8) + Send + Sync>>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    pub fn noop() -> Self {
        Self { sink: None }
    }

    pub fn report(&self, percent: u8) {
        if let Some(sink) = &self.sink {
            sink(percent.min(100));
        }
    }

    /// Report `done / total` as a whole percentage.
    pub fn report_fraction(&self, done: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            ((done.min(total) * 100) / total) as u8
        };
        self.report(percent);
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("attached", &self.sink.is_some())
            .finish()
    }
}

/// Backend boundary for listing, uploading and deleting media.
#[async_trait]
pub trait MediaAdapter: Send + Sync {
    /// Fetch one page of media. Implementations may poll `cancel` and reject
    /// with [`AdapterError::Cancelled`].
    async fn list(&self, params: &ListParams, cancel: &CancelToken)
        -> Result<ListPage, AdapterError>;

    /// Upload one file, reporting integer percentages through `progress`.
    async fn upload(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
    ) -> Result<MediaItem, AdapterError>;

    async fn delete(&self, id: &str) -> Result<(), AdapterError>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let captured = token.clone();
        assert!(captured.check().is_ok());
        token.cancel();
        assert!(captured.is_cancelled());
        assert!(captured.check().unwrap_err().is_cancellation());
    }

    #[test]
    fn progress_is_clamped_and_fractional() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(move |p| sink.lock().push(p));
        reporter.report(250);
        reporter.report_fraction(1, 4);
        reporter.report_fraction(0, 0);
        assert_eq!(*seen.lock(), vec![100, 25, 100]);
    }

    #[test]
    fn noop_reporter_accepts_reports() {
        ProgressReporter::noop().report(50);
    }

    #[test]
    fn only_cancelled_counts_as_cancellation() {
        assert!(AdapterError::Cancelled.is_cancellation());
        assert!(!AdapterError::Rejected("quota".into()).is_cancellation());
        assert!(!AdapterError::Other(anyhow::anyhow!("boom")).is_cancellation());
    }

    #[test]
    fn list_params_serialize_without_empty_fields() {
        let params = ListParams {
            search: Some("cat".into()),
            page: Some(2),
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"search":"cat","page":2}"#);
    }
}
