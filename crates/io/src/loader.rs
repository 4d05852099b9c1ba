// Spreadsheet loading: walk a scope directory, open every workbook, emit one
// tagged table per (sheet, file). Best-effort: unreadable files are logged
// and skipped, never fatal.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::{debug, warn};
use walkdir::WalkDir;

use sheetgrep_engine::model::{CellValue, Column, Provenance, TaggedTable};

use crate::layout::StorageLayout;

/// The single spreadsheet extension the tool recognizes.
pub const ALLOWED_EXTENSION: &str = "xlsx";

/// Extension gate used both by the walker and by the upload handler.
pub fn is_allowed_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(ALLOWED_EXTENSION))
        .unwrap_or(false)
}

/// Recursively load every recognized spreadsheet under `dir`, tagging each
/// sheet with provenance derived from its position in `layout`. A missing or
/// empty directory yields an empty list, not an error.
pub fn load_tables(layout: &StorageLayout, dir: &Path) -> Vec<TaggedTable> {
    let mut tables = Vec::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_allowed_file(&name) {
            continue;
        }
        match load_workbook(layout, path) {
            Ok(mut loaded) => tables.append(&mut loaded),
            Err(err) => warn!("skipping {}: {err}", path.display()),
        }
    }

    tables
}

/// Open one workbook and convert every readable sheet. A sheet that fails to
/// parse is logged and dropped without taking the rest of the file with it.
fn load_workbook(layout: &StorageLayout, path: &Path) -> Result<Vec<TaggedTable>, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| format!("failed to open workbook: {e}"))?;

    let (bank_name, product_type) = layout.provenance_tags(path);
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sheet_names = workbook.sheet_names().to_vec();

    let mut tables = Vec::new();
    for sheet in &sheet_names {
        let range = match workbook.worksheet_range(sheet) {
            Ok(range) => range,
            Err(err) => {
                warn!("skipping sheet '{sheet}' in {}: {err}", path.display());
                continue;
            }
        };
        let columns = columns_from_range(&range);
        debug!("loaded {} sheet '{sheet}' ({} columns)", path.display(), columns.len());
        tables.push(TaggedTable {
            provenance: Provenance {
                sheet: sheet.clone(),
                file: file.clone(),
                bank_name: bank_name.clone(),
                product_type: product_type.clone(),
            },
            columns,
        });
    }
    Ok(tables)
}

/// First row of the range names the columns; the rest is data. A sheet with
/// no rows produces a table with no columns.
fn columns_from_range(range: &Range<Data>) -> Vec<Column> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };

    let mut columns: Vec<Column> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| Column { name: header_name(cell, idx), cells: Vec::new() })
        .collect();

    for row in rows {
        for (idx, column) in columns.iter_mut().enumerate() {
            let cell = row.get(idx).map(cell_value).unwrap_or(CellValue::Empty);
            column.cells.push(cell);
        }
    }

    columns
}

/// Blank header cells still need an addressable name.
fn header_name(cell: &Data, idx: usize) -> String {
    let name = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => cell_value(other).to_string(),
    };
    if name.is_empty() {
        format!("Column{}", idx + 1)
    } else {
        name
    }
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => float_value(*n),
        Data::Int(n) => CellValue::Int(*n),
        Data::Bool(b) => CellValue::Bool(*b),
        // Store error cells as their text representation
        Data::Error(e) => CellValue::Text(format!("#{e:?}")),
        // Date system handling lives in calamine; we keep the raw serial
        Data::DateTime(dt) => float_value(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Integers stored as floats come back as `42`, not `42.0`, matching how the
/// cell displays in the sheet.
fn float_value(n: f64) -> CellValue {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        CellValue::Int(n as i64)
    } else {
        CellValue::Float(n)
    }
}
