use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use sheetgrep_engine::model::TaggedTable;

use crate::layout::StorageLayout;
use crate::loader;

#[derive(Debug)]
pub enum StoreError {
    /// A name segment would escape the upload tree.
    InvalidName(String),
    /// Filesystem failure while storing.
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid name segment: {name}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Repository seam over the upload tree: store a file, list the taxonomy,
/// load a search scope. The search logic only ever sees tagged tables, so
/// the backing store can be swapped without touching it.
pub trait TableStore: Send + Sync {
    /// Store an uploaded file. Empty bank/product strings mean "untagged";
    /// see [`StorageLayout::upload_dir`] for the destination ladder.
    fn put(&self, bank: &str, product: &str, filename: &str, bytes: &[u8])
        -> Result<PathBuf, StoreError>;

    /// Immediate subdirectories of the bank branch, sorted.
    fn bank_names(&self) -> Vec<String>;

    /// Subdirectories one level below the banks, flattened across all banks
    /// and sorted. No bank-to-product association is preserved.
    fn product_types(&self) -> Vec<String>;

    /// Re-read every spreadsheet in the requested scope from disk.
    fn scan(&self, bank: &str, product: &str) -> Vec<TaggedTable>;
}

/// The only shipped implementation: plain directories and files.
#[derive(Debug, Clone)]
pub struct FsStore {
    layout: StorageLayout,
}

impl FsStore {
    /// Open a store rooted at `root`, creating both branches.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let layout = StorageLayout::new(root);
        layout.bootstrap().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }
}

/// Taxonomy names and filenames must stay single path segments.
fn validate_segment(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl TableStore for FsStore {
    fn put(
        &self,
        bank: &str,
        product: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        validate_segment(filename)?;
        for segment in [bank, product] {
            if !segment.is_empty() {
                validate_segment(segment)?;
            }
        }

        let dir = self.layout.upload_dir(bank, product);
        fs::create_dir_all(&dir).map_err(|e| StoreError::Io(e.to_string()))?;
        let dest = dir.join(filename);
        fs::write(&dest, bytes).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(dest)
    }

    fn bank_names(&self) -> Vec<String> {
        list_subdirs(&self.layout.bank_dir()).into_iter().collect()
    }

    fn product_types(&self) -> Vec<String> {
        let mut products = BTreeSet::new();
        for bank in list_subdirs(&self.layout.bank_dir()) {
            products.extend(list_subdirs(&self.layout.bank_dir().join(bank)));
        }
        products.into_iter().collect()
    }

    fn scan(&self, bank: &str, product: &str) -> Vec<TaggedTable> {
        let scope = self.layout.search_scope(bank.trim(), product.trim());
        loader::load_tables(&self.layout, &scope)
    }
}

/// Immediate subdirectory names, sorted. A missing directory lists as empty.
fn list_subdirs(dir: &Path) -> BTreeSet<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return BTreeSet::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    use rust_xlsxwriter::Workbook;
    use sheetgrep_engine::search;

    fn write_fixture(path: &Path, name: &str) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "name").unwrap();
        sheet.write_string(1, 0, name).unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn put_places_file_by_taxonomy() {
        let dir = tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        let dest = store.put("X", "Y", "data.xlsx", b"bytes").unwrap();
        assert_eq!(dest, dir.path().join("Bank/X/Y/data.xlsx"));
        assert_eq!(fs::read(&dest).unwrap(), b"bytes");

        let dest = store.put("X", "", "data.xlsx", b"bytes").unwrap();
        assert_eq!(dest, dir.path().join("Bank/X/data.xlsx"));

        let dest = store.put("", "", "data.xlsx", b"bytes").unwrap();
        assert_eq!(dest, dir.path().join("DATASET/data.xlsx"));

        // Product without bank falls back to the dataset branch
        let dest = store.put("", "Y", "data.xlsx", b"bytes").unwrap();
        assert_eq!(dest, dir.path().join("DATASET/data.xlsx"));
    }

    #[test]
    fn put_rejects_escaping_segments() {
        let dir = tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.put("..", "", "data.xlsx", b""),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.put("X", "a/b", "data.xlsx", b""),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.put("", "", "../data.xlsx", b""),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.put("", "", "", b""),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn catalog_lists_banks_and_flattened_products() {
        let dir = tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        store.put("Globex", "Savings", "a.xlsx", b"").unwrap();
        store.put("Acme", "Checking", "b.xlsx", b"").unwrap();
        store.put("Acme", "Savings", "c.xlsx", b"").unwrap();

        assert_eq!(store.bank_names(), vec!["Acme", "Globex"]);
        // Flattened and deduplicated across banks, no association kept
        assert_eq!(store.product_types(), vec!["Checking", "Savings"]);
    }

    #[test]
    fn empty_store_lists_nothing() {
        let dir = tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        assert!(store.bank_names().is_empty());
        assert!(store.product_types().is_empty());
        assert!(store.scan("", "").is_empty());
    }

    #[test]
    fn scan_scopes_follow_the_ladder() {
        let dir = tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        write_fixture(&store.layout().dataset_dir().join("flat.xlsx"), "flat-row");
        let bank_dest = store.layout().upload_dir("Acme", "Checking");
        fs::create_dir_all(&bank_dest).unwrap();
        write_fixture(&bank_dest.join("q1.xlsx"), "bank-row");

        // No filter: both branches load together
        assert_eq!(store.scan("", "").len(), 2);

        // Bank filter: only the bank subtree
        let tables = store.scan("Acme", "");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].provenance.bank_name, "Acme");

        // Pinned quirk: product without bank scopes to the dataset branch
        let tables = store.scan("", "Checking");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].provenance.bank_name, "");
        assert_eq!(search(&tables, "bank-row").total_distinct_count, 0);
        assert_eq!(search(&tables, "flat-row").total_distinct_count, 1);
    }
}
