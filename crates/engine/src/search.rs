use std::collections::HashSet;

use crate::model::{CellValue, MatchRecord, SearchOutput, TaggedTable, BANK_BRANCH_LABEL};
use crate::normalize::{CellMatcher, SubstringMatcher};

/// Full-scan substring search across every cell of every table.
///
/// The term is normalized (trim + lowercase) and tested for containment
/// against every cell's normalized string form. Matches are collapsed to
/// distinct data rows; provenance never contributes to the dedup key.
pub fn search(tables: &[TaggedTable], term: &str) -> SearchOutput {
    let matcher = SubstringMatcher::new(term);
    let results = collapse_distinct(scan_candidates(tables, &matcher));
    SearchOutput { total_distinct_count: results.len(), results }
}

/// Scan pass: one candidate record per (matching row, matching column) pair.
/// A row that matches in two columns yields two candidates — the distinct
/// collapse decides which survives (first in table/column/row order).
pub fn scan_candidates<M: CellMatcher>(tables: &[TaggedTable], matcher: &M) -> Vec<MatchRecord> {
    let mut candidates = Vec::new();

    for table in tables {
        let rows = table.row_count();
        for column in &table.columns {
            for row in 0..rows {
                let cell = column.cells.get(row).unwrap_or(&CellValue::Empty);
                if cell.is_empty() {
                    continue;
                }
                if !matcher.matches(&cell.to_string()) {
                    continue;
                }
                candidates.push(MatchRecord {
                    sheet: table.provenance.sheet.clone(),
                    file: table.provenance.file.clone(),
                    source_column: column.name.clone(),
                    bank_name: strip_branch_label(&table.provenance.bank_name),
                    product_type: strip_branch_label(&table.provenance.product_type),
                    data: table.row_data(row),
                });
            }
        }
    }

    candidates
}

/// Collapse candidates to distinct data mappings, keeping first-seen order.
pub fn collapse_distinct(candidates: Vec<MatchRecord>) -> Vec<MatchRecord> {
    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    for record in candidates {
        // BTreeMap iterates in key order, so the JSON form is canonical.
        let key = serde_json::to_string(&record.data).unwrap_or_default();
        if seen.insert(key) {
            distinct.push(record);
        }
    }
    distinct
}

/// A provenance field equal to the bank branch label is the branch root
/// itself, not a real bank or product name.
fn strip_branch_label(value: &str) -> String {
    if value == BANK_BRANCH_LABEL {
        String::new()
    } else {
        value.to_string()
    }
}
