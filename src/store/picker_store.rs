//! Synchronous state transitions for list, upload and selection state.

use std::collections::HashMap;
use std::sync::Arc;

use super::state::{PickerState, UploadingPatch};
use crate::media::{MediaItem, TempId, UploadingItem};
use crate::preview::PreviewHandle;

/// Single source of truth for one picker instance.
///
/// Every mutation runs to completion and publishes a fresh snapshot;
/// previously handed out snapshots are never modified. Preview handles for
/// in-flight uploads are owned here and dropped when their placeholder is
/// removed or replaced.
#[derive(Debug, Default)]
pub struct PickerStore {
    state: Arc<PickerState>,
    previews: HashMap<TempId, PreviewHandle>,
}

impl PickerStore {
    /// Fresh store seeded with an initial selection.
    pub fn new<I>(initial_selected: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let state = PickerState {
            selected_ids: initial_selected.into_iter().collect(),
            ..PickerState::default()
        };
        Self {
            state: Arc::new(state),
            previews: HashMap::new(),
        }
    }

    pub fn snapshot(&self) -> Arc<PickerState> {
        Arc::clone(&self.state)
    }

    pub fn state(&self) -> &PickerState {
        &self.state
    }

    fn mutate(&mut self, f: impl FnOnce(&mut PickerState)) {
        f(Arc::make_mut(&mut self.state));
    }

    pub fn set_items(&mut self, items: Vec<MediaItem>) {
        self.mutate(|s| s.items = items);
    }

    pub fn append_items(&mut self, items: Vec<MediaItem>) {
        self.mutate(|s| s.items.extend(items));
    }

    /// Prepend a newly created item. An older copy with the same id is dropped.
    pub fn add_item(&mut self, item: MediaItem) {
        self.mutate(|s| {
            s.items.retain(|existing| existing.id != item.id);
            s.items.insert(0, item);
        });
    }

    /// Remove from the list and from the selection in one step.
    pub fn remove_item(&mut self, id: &str) {
        self.mutate(|s| {
            s.items.retain(|item| item.id != id);
            s.selected_ids.remove(id);
        });
    }

    /// Register a placeholder together with the preview it displays. A
    /// placeholder already holding `temp_id` is replaced in place and its
    /// preview released.
    pub fn add_uploading_item(&mut self, item: UploadingItem, preview: PreviewHandle) {
        let temp_id = item.temp_id.clone();
        self.mutate(|s| {
            match s.uploading_items.iter_mut().find(|u| u.temp_id == item.temp_id) {
                Some(existing) => *existing = item,
                None => s.uploading_items.push(item),
            }
        });
        if let Some(previous) = self.previews.insert(temp_id.clone(), preview) {
            tracing::warn!(temp_id = %temp_id, "Replaced placeholder for duplicate temp id");
            drop(previous);
        }
    }

    /// Returns `false` when no placeholder has `temp_id`.
    pub fn update_uploading_item(&mut self, temp_id: &TempId, patch: UploadingPatch) -> bool {
        if self.state.uploading(temp_id).is_none() {
            return false;
        }
        self.mutate(|s| {
            if let Some(target) = s.uploading_items.iter_mut().find(|u| &u.temp_id == temp_id) {
                patch.apply(target);
            }
        });
        true
    }

    /// Drop the placeholder and release its preview.
    pub fn remove_uploading_item(&mut self, temp_id: &TempId) {
        if self.state.uploading(temp_id).is_some() {
            self.mutate(|s| s.uploading_items.retain(|u| &u.temp_id != temp_id));
        }
        self.previews.remove(temp_id);
    }

    /// Swap the placeholder for the confirmed item in one transition. The item
    /// is prepended even when no placeholder matches.
    pub fn replace_uploading_with_media(&mut self, temp_id: &TempId, item: MediaItem) {
        self.mutate(|s| {
            s.uploading_items.retain(|u| &u.temp_id != temp_id);
            s.items.retain(|existing| existing.id != item.id);
            s.items.insert(0, item);
        });
        self.previews.remove(temp_id);
    }

    pub fn toggle_selection(&mut self, id: &str, multiple: bool) {
        self.mutate(|s| {
            if s.selected_ids.remove(id) {
                return;
            }
            if !multiple {
                s.selected_ids.clear();
            }
            s.selected_ids.insert(id.to_string());
        });
    }

    pub fn select_item(&mut self, id: &str, multiple: bool) {
        if multiple && self.state.is_selected(id) {
            return;
        }
        self.mutate(|s| {
            if !multiple {
                s.selected_ids.clear();
            }
            s.selected_ids.insert(id.to_string());
        });
    }

    pub fn deselect_item(&mut self, id: &str) {
        if self.state.is_selected(id) {
            self.mutate(|s| {
                s.selected_ids.remove(id);
            });
        }
    }

    pub fn clear_selection(&mut self) {
        if !self.state.selected_ids.is_empty() {
            self.mutate(|s| s.selected_ids.clear());
        }
    }

    pub fn set_selected_ids<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let ids = ids.into_iter().collect();
        self.mutate(|s| s.selected_ids = ids);
    }

    /// New query invalidates the pagination cursor.
    pub fn set_search_query(&mut self, query: &str) {
        self.mutate(|s| {
            s.search_query = query.to_string();
            s.page = 1;
        });
    }

    pub fn set_page(&mut self, page: u32) {
        self.mutate(|s| s.page = page);
    }

    pub fn set_pagination(&mut self, has_more: bool, total: u64) {
        self.mutate(|s| {
            s.has_more = has_more;
            s.total = total;
        });
    }

    pub fn set_loading(&mut self, loading: bool) {
        if self.state.is_loading != loading {
            self.mutate(|s| s.is_loading = loading);
        }
    }

    /// Back to an empty store. Outstanding previews are released.
    pub fn reset(&mut self) {
        self.state = Arc::new(PickerState::default());
        self.previews.clear();
    }

    pub fn preview_count(&self) -> usize {
        self.previews.len()
    }
}
