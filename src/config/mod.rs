pub mod schema;

pub use schema::{Config, LibraryConfig, PickerConfig};
