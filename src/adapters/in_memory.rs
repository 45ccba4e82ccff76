//! In-memory media adapter.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::traits::{AdapterError, CancelToken, ListPage, ListParams, MediaAdapter, ProgressReporter};
use crate::media::{MediaItem, UploadFile};

/// Page size used when the caller does not pass a limit.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

#[derive(Debug, Clone)]
struct Entry {
    folder_id: Option<String>,
    item: MediaItem,
}

/// An in-memory adapter backed by a mutex-protected list, newest first.
pub struct InMemoryMediaAdapter {
    entries: Mutex<Vec<Entry>>,
}

impl InMemoryMediaAdapter {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Seed with existing items, keeping the given order.
    pub fn with_items(items: Vec<MediaItem>) -> Self {
        let entries = items
            .into_iter()
            .map(|item| Entry {
                folder_id: None,
                item,
            })
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn insert_in_folder(&self, folder_id: &str, item: MediaItem) {
        self.entries.lock().insert(
            0,
            Entry {
                folder_id: Some(folder_id.to_string()),
                item,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for InMemoryMediaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter by folder and case-insensitive name substring, then cut one page.
/// Pages are 1-based; page 0 is treated as page 1.
pub(crate) fn select_page<'a, I>(entries: I, params: &ListParams) -> ListPage
where
    I: IntoIterator<Item = (Option<&'a str>, &'a MediaItem)>,
{
    let needle = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let matching: Vec<&MediaItem> = entries
        .into_iter()
        .filter(|(folder, _)| match params.folder_id.as_deref() {
            Some(wanted) => *folder == Some(wanted),
            None => true,
        })
        .filter(|(_, item)| match needle {
            Some(ref n) => item.name.to_lowercase().contains(n),
            None => true,
        })
        .map(|(_, item)| item)
        .collect();

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1) as usize;
    let page = params.page.unwrap_or(1).max(1) as usize;
    let start = (page - 1).saturating_mul(limit);
    let total = matching.len();

    let items: Vec<MediaItem> = matching
        .into_iter()
        .skip(start)
        .take(limit)
        .cloned()
        .collect();

    ListPage {
        has_more: start + items.len() < total,
        total: total as u64,
        items,
    }
}

#[async_trait]
impl MediaAdapter for InMemoryMediaAdapter {
    async fn list(
        &self,
        params: &ListParams,
        cancel: &CancelToken,
    ) -> Result<ListPage, AdapterError> {
        cancel.check()?;
        let entries = self.entries.lock();
        Ok(select_page(
            entries.iter().map(|e| (e.folder_id.as_deref(), &e.item)),
            params,
        ))
    }

    async fn upload(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
    ) -> Result<MediaItem, AdapterError> {
        let kind = file
            .kind()
            .ok_or_else(|| AdapterError::Unsupported(file.name.clone()))?;
        progress.report(50);

        let id = uuid::Uuid::new_v4().to_string();
        let item = MediaItem {
            url: format!("memory://{id}"),
            id,
            name: file.name.clone(),
            kind,
            size: file.size(),
            width: None,
            height: None,
            created_at: Utc::now(),
        };
        self.entries.lock().insert(
            0,
            Entry {
                folder_id: None,
                item: item.clone(),
            },
        );
        progress.report(100);
        Ok(item)
    }

    async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.item.id != id);
        if entries.len() == before {
            return Err(AdapterError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use std::sync::Arc;

    fn item(id: &str, name: &str) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            url: format!("memory://{id}"),
            name: name.to_string(),
            kind: MediaKind::Image,
            size: 1,
            width: None,
            height: None,
            created_at: Utc::now(),
        }
    }

    fn seeded(n: usize) -> InMemoryMediaAdapter {
        InMemoryMediaAdapter::with_items(
            (0..n)
                .map(|i| item(&format!("m{i}"), &format!("photo-{i}.png")))
                .collect(),
        )
    }

    #[tokio::test]
    async fn list_paginates_in_insertion_order() {
        let adapter = seeded(5);
        let params = ListParams {
            page: Some(2),
            limit: Some(2),
            ..Default::default()
        };
        let page = adapter.list(&params, &CancelToken::new()).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);
        assert_eq!(page.total, 5);
        assert!(page.has_more);

        let last = ListParams {
            page: Some(3),
            limit: Some(2),
            ..Default::default()
        };
        let page = adapter.list(&last, &CancelToken::new()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn list_filters_by_search_case_insensitively() {
        let adapter = InMemoryMediaAdapter::with_items(vec![
            item("a", "Cat.png"),
            item("b", "dog.png"),
            item("c", "cats-on-sofa.jpg"),
        ]);
        let params = ListParams {
            search: Some("  CAT ".into()),
            ..Default::default()
        };
        let page = adapter.list(&params, &CancelToken::new()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].id, "a");
        assert_eq!(page.items[1].id, "c");
    }

    #[tokio::test]
    async fn list_filters_by_folder() {
        let adapter = seeded(2);
        adapter.insert_in_folder("albums", item("f1", "album.png"));
        let params = ListParams {
            folder_id: Some("albums".into()),
            ..Default::default()
        };
        let page = adapter.list(&params, &CancelToken::new()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "f1");
    }

    #[tokio::test]
    async fn list_rejects_when_already_cancelled() {
        let adapter = seeded(1);
        let token = CancelToken::new();
        token.cancel();
        let err = adapter
            .list(&ListParams::default(), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn upload_prepends_and_reports_progress() {
        let adapter = seeded(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let uploaded = adapter
            .upload(
                UploadFile::new("new.png", vec![0u8; 8]),
                ProgressReporter::new(move |p| sink.lock().push(p)),
            )
            .await
            .unwrap();
        assert_eq!(uploaded.size, 8);
        assert_eq!(*seen.lock(), vec![50, 100]);

        let page = adapter
            .list(&ListParams::default(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(page.items[0].id, uploaded.id);
    }

    #[tokio::test]
    async fn upload_rejects_unknown_kinds() {
        let adapter = InMemoryMediaAdapter::new();
        let err = adapter
            .upload(UploadFile::new("notes.txt", vec![1u8]), ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported(_)));
        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn delete_missing_item_is_not_found() {
        let adapter = seeded(1);
        tokio_test::assert_ok!(adapter.delete("m0").await);
        let err = adapter.delete("m0").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotFound(_)));
    }
}
