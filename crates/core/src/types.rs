//! Table set data model shared by every engine component.
//!
//! A sheet is a header row followed by data rows. Column 0 of every row is a
//! non-semantic index column and is skipped by validation and diffing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single cell: a string, a number, or null.
pub type CellValue = serde_json::Value;

/// One row of cells, index column included.
pub type Row = Vec<CellValue>;

/// All sheets keyed by sheet key. Ordered so diffs and reports are stable.
pub type TableSet = BTreeMap<String, Sheet>;

/// First column that carries data. Column 0 is the index column.
pub const FIRST_DATA_COLUMN: usize = 1;

/// Row position of the header inside [`Sheet::content`].
pub const HEADER_ROW: usize = 0;

/// A named table: `content[0]` is the header row, `content[1..]` are data rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub content: Vec<Row>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, content: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// The header row, or an empty slice for a sheet with no content.
    pub fn headers(&self) -> &[CellValue] {
        self.content.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Data rows paired with their position in `content` (first data row is 1).
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.content.iter().enumerate().skip(HEADER_ROW + 1)
    }

    /// Number of data rows (header excluded).
    pub fn data_row_count(&self) -> usize {
        self.content.len().saturating_sub(1)
    }

    /// Position of the column whose header text equals `name`.
    ///
    /// The index column is never matched.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers()
            .iter()
            .enumerate()
            .skip(FIRST_DATA_COLUMN)
            .find(|(_, header)| cell_text(header).trim() == name.trim())
            .map(|(idx, _)| idx)
    }

    /// Cell at `(row, col)`, if the row and column exist.
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.content.get(row).and_then(|r| r.get(col))
    }

    /// Text of every data cell in column `col`, in row order.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = String> + '_ {
        self.data_rows()
            .map(move |(_, row)| row.get(col).map(cell_text).unwrap_or_default())
    }
}

/// Stringify a cell the way comparisons see it: null is empty, strings are
/// taken verbatim, numbers use their JSON rendering.
pub fn cell_text(value: &CellValue) -> String {
    match value {
        CellValue::Null => String::new(),
        CellValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a cell counts as empty (null, or whitespace-only text).
pub fn is_blank(value: &CellValue) -> bool {
    cell_text(value).trim().is_empty()
}

/// Find the sheet a rule's `target_table` refers to.
///
/// Rules name tables by sheet name; a sheet whose key equals the target is
/// accepted as well. Returns the sheet key alongside the sheet.
pub fn find_sheet<'a>(tables: &'a TableSet, target: &str) -> Option<(&'a str, &'a Sheet)> {
    tables
        .iter()
        .find(|(_, sheet)| sheet.name == target)
        .or_else(|| tables.get_key_value(target))
        .map(|(key, sheet)| (key.as_str(), sheet))
}
