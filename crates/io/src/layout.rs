use std::io;
use std::path::{Path, PathBuf};

use sheetgrep_engine::model::BANK_BRANCH_LABEL;

/// Flat branch for uploads without bank/product tagging.
pub const DATASET_DIR: &str = "DATASET";

/// The upload tree: a root with two named branches.
///
/// ```text
/// <root>/DATASET/<file>                      flat dataset branch
/// <root>/Bank/<bank>/<product>/<file>        bank branch
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.root.join(DATASET_DIR)
    }

    pub fn bank_dir(&self) -> PathBuf {
        self.root.join(BANK_BRANCH_LABEL)
    }

    /// Create both branches. Run once at startup so an empty install answers
    /// listing requests without error.
    pub fn bootstrap(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.dataset_dir())?;
        std::fs::create_dir_all(self.bank_dir())?;
        Ok(())
    }

    /// Destination directory for an upload. Bank without product stores at
    /// the bank level; no bank stores in the dataset branch (a product type
    /// without a bank is ignored, same as the search scope below).
    pub fn upload_dir(&self, bank: &str, product: &str) -> PathBuf {
        if !bank.is_empty() && !product.is_empty() {
            self.bank_dir().join(bank).join(product)
        } else if !bank.is_empty() {
            self.bank_dir().join(bank)
        } else {
            self.dataset_dir()
        }
    }

    /// Directory a search request covers.
    ///
    /// Neither filter → the whole root (flat and bank branches together).
    /// A product type without a bank name has no bank subtree to scope to;
    /// it falls through to the dataset branch and the product type is
    /// silently ignored (pinned by a test).
    pub fn search_scope(&self, bank: &str, product: &str) -> PathBuf {
        if bank.is_empty() && product.is_empty() {
            self.root.clone()
        } else if bank.is_empty() {
            self.dataset_dir()
        } else if product.is_empty() {
            self.bank_dir().join(bank)
        } else {
            self.bank_dir().join(bank).join(product)
        }
    }

    /// Derive (bank name, product type) for a stored file from its position
    /// under the bank branch: first directory component is the bank, second
    /// is the product type. Files outside the bank branch, or missing a
    /// component, get empty strings.
    pub fn provenance_tags(&self, file: &Path) -> (String, String) {
        let Ok(rel) = file.strip_prefix(self.bank_dir()) else {
            return (String::new(), String::new());
        };
        let dirs: Vec<String> = rel
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        let bank = dirs.first().cloned().unwrap_or_default();
        let product = dirs.get(1).cloned().unwrap_or_default();
        (bank, product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> StorageLayout {
        StorageLayout::new("/data/uploads")
    }

    #[test]
    fn upload_dir_ladder() {
        let l = layout();
        assert_eq!(l.upload_dir("Acme", "Checking"), Path::new("/data/uploads/Bank/Acme/Checking"));
        assert_eq!(l.upload_dir("Acme", ""), Path::new("/data/uploads/Bank/Acme"));
        assert_eq!(l.upload_dir("", ""), Path::new("/data/uploads/DATASET"));
        // Product without bank has nowhere to hang off the bank branch.
        assert_eq!(l.upload_dir("", "Checking"), Path::new("/data/uploads/DATASET"));
    }

    #[test]
    fn search_scope_ladder() {
        let l = layout();
        assert_eq!(l.search_scope("", ""), Path::new("/data/uploads"));
        assert_eq!(l.search_scope("Acme", ""), Path::new("/data/uploads/Bank/Acme"));
        assert_eq!(
            l.search_scope("Acme", "Checking"),
            Path::new("/data/uploads/Bank/Acme/Checking")
        );
        // The pinned quirk: product without bank scopes to the dataset branch.
        assert_eq!(l.search_scope("", "Checking"), Path::new("/data/uploads/DATASET"));
    }

    #[test]
    fn provenance_from_bank_branch_position() {
        let l = layout();
        let tags = |p: &str| l.provenance_tags(Path::new(p));
        assert_eq!(
            tags("/data/uploads/Bank/Acme/Checking/q1.xlsx"),
            ("Acme".into(), "Checking".into())
        );
        assert_eq!(tags("/data/uploads/Bank/Acme/q1.xlsx"), ("Acme".into(), "".into()));
        assert_eq!(tags("/data/uploads/Bank/q1.xlsx"), ("".into(), "".into()));
        assert_eq!(tags("/data/uploads/DATASET/q1.xlsx"), ("".into(), "".into()));
    }
}
