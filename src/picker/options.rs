use std::time::Duration;

use crate::media::MediaItem;

pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// How long a finished upload stays visible before it is swapped for the real item.
pub const DEFAULT_SUCCESS_DISPLAY_DELAY: Duration = Duration::from_millis(500);
/// How long a failed upload stays visible before it is dropped.
pub const DEFAULT_ERROR_DISPLAY_DELAY: Duration = Duration::from_millis(3000);

/// Construction-time options for a [`MediaPicker`](super::MediaPicker).
#[derive(Debug, Clone)]
pub struct PickerOptions {
    /// Multi-select when true; otherwise at most one id is selected.
    pub multiple: bool,
    /// Seeds the selection ids only; the items are not added to the list.
    pub initial_selected: Vec<MediaItem>,
    pub debounce_delay: Duration,
    pub page_size: u32,
    pub folder_id: Option<String>,
    pub success_display_delay: Duration,
    pub error_display_delay: Duration,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            multiple: false,
            initial_selected: Vec::new(),
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
            folder_id: None,
            success_display_delay: DEFAULT_SUCCESS_DISPLAY_DELAY,
            error_display_delay: DEFAULT_ERROR_DISPLAY_DELAY,
        }
    }
}

impl PickerOptions {
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn initial_selected(mut self, items: Vec<MediaItem>) -> Self {
        self.initial_selected = items;
        self
    }

    pub fn debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page_size must be greater than 0");
        }
        if let Some(folder) = &self.folder_id {
            if folder.trim().is_empty() {
                anyhow::bail!("folder_id must not be blank when set");
            }
        }
        Ok(())
    }

    /// Ids to seed the selection with. Single-select keeps only the first.
    pub(crate) fn initial_selected_ids(&self) -> Vec<String> {
        let ids = self.initial_selected.iter().map(|item| item.id.clone());
        if self.multiple {
            ids.collect()
        } else {
            ids.take(1).collect()
        }
    }
}
