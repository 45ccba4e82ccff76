//! Media data model shared by the adapter boundary, the store and the picker.

pub mod types;

pub use types::{MediaItem, MediaKind, TempId, UploadFile, UploadStatus, UploadingItem};
