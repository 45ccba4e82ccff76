//! Backend adapters: the contract the picker depends on plus two bundled
//! implementations (directory-backed and in-memory).

pub mod in_memory;
pub mod local;
pub mod traits;

pub use in_memory::InMemoryMediaAdapter;
pub use local::LocalMediaAdapter;
pub use traits::{AdapterError, CancelToken, ListPage, ListParams, MediaAdapter, ProgressReporter};

use std::path::Path;
use std::sync::Arc;

pub fn create_local_adapter(base_dir: &Path, max_upload_bytes: Option<u64>) -> Arc<dyn MediaAdapter> {
    let adapter = LocalMediaAdapter::new(base_dir);
    match max_upload_bytes {
        Some(limit) => Arc::new(adapter.with_max_upload_bytes(limit)),
        None => Arc::new(adapter),
    }
}

pub fn create_in_memory_adapter() -> Arc<dyn MediaAdapter> {
    Arc::new(InMemoryMediaAdapter::new())
}
