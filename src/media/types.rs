use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "avi", "m4v"];

/// Kind of a confirmed media asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a file name by its extension. Returns `None` for anything
    /// that is neither a known image nor a known video format.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let top = mime.split('/').next()?.trim();
        match top {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// A confirmed remote asset. Identity is `id`; never mutated once received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Process-local identifier of a single upload attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TempId(pub String);

impl TempId {
    /// Time + randomness based id. Collisions are improbable, not impossible;
    /// callers that track active uploads re-roll on a hit.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let salt: u64 = rand::random();
        Self(format!("upload-{millis}-{salt:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Success,
    Error,
}

/// Local placeholder rendered while a file is being uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadingItem {
    pub temp_id: TempId,
    pub preview_url: String,
    pub file_name: String,
    pub progress: u8,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaItem>,
}

impl UploadingItem {
    pub fn new(temp_id: TempId, preview_url: String, file_name: String) -> Self {
        Self {
            temp_id,
            preview_url,
            file_name,
            progress: 0,
            status: UploadStatus::Uploading,
            error: None,
            media: None,
        }
    }
}

/// Raw file submitted for upload. Bytes are shared so the preview and the
/// adapter can both hold them without copying.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Arc<[u8]>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            data: data.into(),
        }
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub async fn from_path(path: &Path) -> anyhow::Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read upload source {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("Upload source has no usable file name")?
            .to_string();
        Ok(Self::new(name, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Kind from the declared MIME type, falling back to the file extension.
    pub fn kind(&self) -> Option<MediaKind> {
        self.mime_type
            .as_deref()
            .and_then(MediaKind::from_mime)
            .or_else(|| MediaKind::from_file_name(&self.name))
    }
}
