use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Reserved directory name for the bank branch root. Provenance fields that
/// equal this label are blanked in search output, and the storage layer uses
/// it as the branch directory name so the two can never disagree.
pub const BANK_BRANCH_LABEL: &str = "Bank";

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// One spreadsheet cell, as loaded. Serializes to the bare JSON value
/// (`Empty` becomes `null`).
///
/// Floats with an integral value are collapsed to `Int` at load time so a
/// cell holding `42` reports as `42`, not `42.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// True for cells that can never match a search term.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Int(n) => write!(f, "{n}"),
            CellValue::Float(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A named column of cells, in sheet order.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub cells: Vec<CellValue>,
}

/// Where a table came from. Bank name and product type are empty strings for
/// tables loaded from the flat dataset branch.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    pub sheet: String,
    pub file: String,
    pub bank_name: String,
    pub product_type: String,
}

/// One loaded spreadsheet sheet plus its provenance. Built fresh per search
/// request and discarded with the response.
#[derive(Debug, Clone)]
pub struct TaggedTable {
    pub provenance: Provenance,
    pub columns: Vec<Column>,
}

impl TaggedTable {
    /// Number of data rows (longest column wins; short columns read as empty).
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.cells.len()).max().unwrap_or(0)
    }

    /// The full data mapping for one row: original column name to original
    /// cell value. This mapping — and nothing else — is the dedup key.
    pub fn row_data(&self, row: usize) -> BTreeMap<String, CellValue> {
        self.columns
            .iter()
            .map(|c| {
                let cell = c.cells.get(row).cloned().unwrap_or(CellValue::Empty);
                (c.name.clone(), cell)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One reported search hit: provenance metadata plus the original row data.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRecord {
    #[serde(rename = "Sheet")]
    pub sheet: String,
    #[serde(rename = "File")]
    pub file: String,
    #[serde(rename = "Source_Column")]
    pub source_column: String,
    #[serde(rename = "Bank_Name")]
    pub bank_name: String,
    #[serde(rename = "Product_Type")]
    pub product_type: String,
    #[serde(rename = "Data")]
    pub data: BTreeMap<String, CellValue>,
}

/// Search response body: distinct match records plus their count.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    pub results: Vec<MatchRecord>,
    pub total_distinct_count: usize,
}
