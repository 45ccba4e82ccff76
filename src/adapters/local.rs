use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::in_memory::select_page;
use super::traits::{AdapterError, CancelToken, ListPage, ListParams, MediaAdapter, ProgressReporter};
use crate::media::{MediaItem, MediaKind, UploadFile};

const MANIFEST_FILE: &str = "library.json";
const WRITE_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
    file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    folder_id: Option<String>,
    item: MediaItem,
}

/// Local filesystem media library. Files are stored under a base directory
/// using UUID-based filenames; display names and metadata live in a JSON
/// manifest next to them.
pub struct LocalMediaAdapter {
    base_dir: PathBuf,
    folder_id: Option<String>,
    max_upload_bytes: Option<u64>,
    // Serializes manifest read-modify-write cycles.
    manifest_lock: tokio::sync::Mutex<()>,
}

impl LocalMediaAdapter {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            folder_id: None,
            max_upload_bytes: None,
            manifest_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Tag new uploads with a folder id.
    pub fn with_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = Some(limit);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn manifest_path(&self) -> PathBuf {
        self.base_dir.join(MANIFEST_FILE)
    }

    async fn load_manifest(&self) -> Result<Vec<ManifestEntry>, AdapterError> {
        match tokio::fs::read(self.manifest_path()).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AdapterError::Other(anyhow::anyhow!(
                    "Failed to parse {}: {e}",
                    self.manifest_path().display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_manifest(&self, entries: &[ManifestEntry]) -> Result<(), AdapterError> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| AdapterError::Other(anyhow::anyhow!("Failed to encode manifest: {e}")))?;
        let temp_path = self
            .base_dir
            .join(format!(".{MANIFEST_FILE}.tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, self.manifest_path()).await?;
        Ok(())
    }

    async fn store_file(
        &self,
        id: String,
        file_name: String,
        path: &Path,
        file: &UploadFile,
        kind: MediaKind,
        progress: &ProgressReporter,
    ) -> Result<MediaItem, AdapterError> {
        let mut out = tokio::fs::File::create(path).await?;
        let total = file.size();
        let mut written: u64 = 0;
        for chunk in file.data.chunks(WRITE_CHUNK_BYTES) {
            out.write_all(chunk).await?;
            written += chunk.len() as u64;
            progress.report_fraction(written, total);
        }
        out.flush().await?;
        drop(out);
        if total == 0 {
            progress.report(100);
        }

        let item = MediaItem {
            id,
            url: format!("file://{}", path.display()),
            name: file.name.clone(),
            kind,
            size: total,
            width: None,
            height: None,
            created_at: chrono::Utc::now(),
        };

        let _guard = self.manifest_lock.lock().await;
        let mut entries = self.load_manifest().await?;
        entries.push(ManifestEntry {
            file_name,
            folder_id: self.folder_id.clone(),
            item: item.clone(),
        });
        self.save_manifest(&entries).await?;
        Ok(item)
    }
}

#[async_trait]
impl MediaAdapter for LocalMediaAdapter {
    async fn list(
        &self,
        params: &ListParams,
        cancel: &CancelToken,
    ) -> Result<ListPage, AdapterError> {
        cancel.check()?;
        let mut entries = self.load_manifest().await?;
        cancel.check()?;

        entries.sort_by(|a, b| b.item.created_at.cmp(&a.item.created_at));
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
        let kind = file.kind().ok_or_else(|| {
            AdapterError::Unsupported(format!("{} is not an image or video", file.name))
        })?;
        if let Some(limit) = self.max_upload_bytes {
            if file.size() > limit {
                return Err(AdapterError::Rejected(format!(
                    "{} is {} bytes, larger than the {limit} byte limit",
                    file.name,
                    file.size()
                )));
            }
        }

        tokio::fs::create_dir_all(&self.base_dir).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let extension = Path::new(&file.name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let file_name = format!("{id}.{extension}");
        let path = self.base_dir.join(&file_name);

        match self
            .store_file(id, file_name, &path, &file, kind, &progress)
            .await
        {
            Ok(item) => {
                tracing::debug!(id = %item.id, name = %item.name, size = item.size, "Stored media file");
                Ok(item)
            }
            Err(e) => {
                // Nothing in the manifest points at a partial file.
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %path.display(), "Failed to remove partial upload: {cleanup}");
                    }
                }
                Err(e)
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        let _guard = self.manifest_lock.lock().await;
        let mut entries = self.load_manifest().await?;
        let Some(pos) = entries.iter().position(|e| e.item.id == id) else {
            return Err(AdapterError::NotFound(id.to_string()));
        };
        let entry = entries.remove(pos);

        match tokio::fs::remove_file(self.base_dir.join(&entry.file_name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(id, file = %entry.file_name, "Media file already missing on delete");
            }
            Err(e) => return Err(e.into()),
        }
        self.save_manifest(&entries).await
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn png(name: &str, len: usize) -> UploadFile {
        UploadFile::new(name, vec![0xABu8; len])
    }

    #[tokio::test]
    async fn upload_and_list_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let adapter = LocalMediaAdapter::new(tmp.path());
        let item = adapter
            .upload(png("beach.png", 5), ProgressReporter::noop())
            .await
            .unwrap();
        assert_eq!(item.name, "beach.png");
        assert!(item.url.starts_with("file://"));

        let page = adapter
            .list(&ListParams::default(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0], item);
    }

    #[tokio::test]
    async fn list_on_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let adapter = LocalMediaAdapter::new(&tmp.path().join("nope"));
        let page = adapter
            .list(&ListParams::default(), &CancelToken::new())
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_searchable() {
        let tmp = TempDir::new().unwrap();
        let adapter = LocalMediaAdapter::new(tmp.path());
        let first = adapter
            .upload(png("cat.png", 1), ProgressReporter::noop())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = adapter
            .upload(png("cats.png", 1), ProgressReporter::noop())
            .await
            .unwrap();
        adapter
            .upload(png("dog.png", 1), ProgressReporter::noop())
            .await
            .unwrap();

        let params = ListParams {
            search: Some("cat".into()),
            ..Default::default()
        };
        let page = adapter.list(&params, &CancelToken::new()).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn upload_reports_progress_per_chunk() {
        let tmp = TempDir::new().unwrap();
        let adapter = LocalMediaAdapter::new(tmp.path());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        adapter
            .upload(
                png("big.png", WRITE_CHUNK_BYTES * 2),
                ProgressReporter::new(move |p| sink.lock().push(p)),
            )
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec![50, 100]);
    }

    #[tokio::test]
    async fn upload_enforces_size_limit_and_kind() {
        let tmp = TempDir::new().unwrap();
        let adapter = LocalMediaAdapter::new(tmp.path()).with_max_upload_bytes(4);
        let err = adapter
            .upload(png("large.png", 10), ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Rejected(_)));
        assert!(err.to_string().contains("byte limit"));

        let err = adapter
            .upload(UploadFile::new("doc.pdf", vec![1u8]), ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported(_)));
    }

    #[tokio::test]
    async fn failed_manifest_update_removes_written_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), "not json").unwrap();
        let adapter = LocalMediaAdapter::new(tmp.path());

        let err = adapter
            .upload(png("orphan.png", 4), ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Other(_)));

        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![MANIFEST_FILE.to_string()]);
    }

    #[tokio::test]
    async fn delete_removes_file_and_entry() {
        let tmp = TempDir::new().unwrap();
        let adapter = LocalMediaAdapter::new(tmp.path());
        let item = adapter
            .upload(png("rm.png", 3), ProgressReporter::noop())
            .await
            .unwrap();
        let stored = tmp.path().join(format!("{}.png", item.id));
        assert!(stored.exists());

        adapter.delete(&item.id).await.unwrap();
        assert!(!stored.exists());
        let page = adapter
            .list(&ListParams::default(), &CancelToken::new())
            .await
            .unwrap();
        assert!(page.items.is_empty());

        let err = adapter.delete(&item.id).await.unwrap_err();
        assert!(matches!(err, AdapterError::NotFound(_)));
    }

    #[tokio::test]
    async fn folder_scoped_uploads_are_filterable() {
        let tmp = TempDir::new().unwrap();
        let plain = LocalMediaAdapter::new(tmp.path());
        plain
            .upload(png("root.png", 1), ProgressReporter::noop())
            .await
            .unwrap();
        let scoped = LocalMediaAdapter::new(tmp.path()).with_folder("trips");
        let trip = scoped
            .upload(png("trip.png", 1), ProgressReporter::noop())
            .await
            .unwrap();

        let params = ListParams {
            folder_id: Some("trips".into()),
            ..Default::default()
        };
        let page = plain.list(&params, &CancelToken::new()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, trip.id);
    }
}
