//! Snapshot and read projection types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::media::{MediaItem, TempId, UploadStatus, UploadingItem};

/// Immutable snapshot of everything the picker tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerState {
    /// Confirmed items in server order.
    pub items: Vec<MediaItem>,
    pub uploading_items: Vec<UploadingItem>,
    pub selected_ids: BTreeSet<String>,
    pub search_query: String,
    /// 1-based page of the last requested listing page.
    pub page: u32,
    pub has_more: bool,
    pub total: u64,
    pub is_loading: bool,
}

impl Default for PickerState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            uploading_items: Vec::new(),
            selected_ids: BTreeSet::new(),
            search_query: String::new(),
            page: 1,
            has_more: false,
            total: 0,
            is_loading: false,
        }
    }
}

impl PickerState {
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_ids.contains(id)
    }

    pub fn uploading(&self, temp_id: &TempId) -> Option<&UploadingItem> {
        self.uploading_items.iter().find(|u| &u.temp_id == temp_id)
    }

    /// Selected ids that resolve to a listed item, in list order. Ids without
    /// a listed item are inert and skipped.
    pub fn selected_items(&self) -> Vec<MediaItem> {
        self.items
            .iter()
            .filter(|item| self.selected_ids.contains(&item.id))
            .cloned()
            .collect()
    }

    pub fn view(&self) -> PickerView {
        PickerView {
            items: self.items.clone(),
            uploading_items: self.uploading_items.clone(),
            selected_items: self.selected_items(),
            selected_ids: self.selected_ids.iter().cloned().collect(),
            is_loading: self.is_loading,
            search_query: self.search_query.clone(),
            page: self.page,
            has_more: self.has_more,
            total: self.total,
        }
    }
}

/// What the presentation layer renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerView {
    pub items: Vec<MediaItem>,
    pub uploading_items: Vec<UploadingItem>,
    pub selected_items: Vec<MediaItem>,
    pub selected_ids: Vec<String>,
    pub is_loading: bool,
    pub search_query: String,
    pub page: u32,
    pub has_more: bool,
    pub total: u64,
}

/// Partial update for an uploading placeholder. `None` fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct UploadingPatch {
    pub progress: Option<u8>,
    pub status: Option<UploadStatus>,
    pub error: Option<String>,
    pub media: Option<MediaItem>,
}

impl UploadingPatch {
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn succeeded(media: MediaItem) -> Self {
        Self {
            progress: Some(100),
            status: Some(UploadStatus::Success),
            media: Some(media),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(UploadStatus::Error),
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, target: &mut UploadingItem) {
        if let Some(progress) = self.progress {
            target.progress = progress.min(100);
        }
        if let Some(status) = self.status {
            target.status = status;
        }
        if let Some(error) = self.error {
            target.error = Some(error);
        }
        if let Some(media) = self.media {
            target.media = Some(media);
        }
    }
}
