//! Selection & list state store — pure, synchronous state transitions.

pub mod picker_store;
pub mod state;

pub use picker_store::PickerStore;
pub use state::{PickerState, PickerView, UploadingPatch};

use crate::media::MediaItem;

/// Per-instance store factory. Only the ids of `initial_selected` are kept;
/// the items themselves are not added to the list.
pub fn create_store(initial_selected: &[MediaItem]) -> PickerStore {
    PickerStore::new(initial_selected.iter().map(|item| item.id.clone()))
}
