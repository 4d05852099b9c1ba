// Filesystem side of sheetgrep: upload tree layout, spreadsheet loading,
// and the repository interface the server talks to.

pub mod layout;
pub mod loader;
pub mod store;

pub use layout::{StorageLayout, DATASET_DIR};
pub use loader::{is_allowed_file, load_tables, ALLOWED_EXTENSION};
pub use store::{FsStore, StoreError, TableStore};
