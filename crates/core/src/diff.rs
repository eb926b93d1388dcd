//! Positional diff between the snapshot and the live table set.
//!
//! Row `i` of a live sheet is compared with row `i` of the snapshot sheet of
//! the same key. There is no row identity, so an insertion in the middle of a
//! sheet shows up as a run of modified cells followed by a trailing add.

use serde::{Deserialize, Serialize};

use crate::types::{cell_text, CellValue, Row, Sheet, TableSet, FIRST_DATA_COLUMN, HEADER_ROW};

/// Fieldless discriminant of [`Change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    RowAdded,
    RowRemoved,
    CellModified,
    TableRemoved,
}

impl ChangeKind {
    /// String representation for display and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RowAdded => "row_added",
            Self::RowRemoved => "row_removed",
            Self::CellModified => "cell_modified",
            Self::TableRemoved => "table_removed",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural difference between snapshot and live state.
///
/// `row_index` is the position inside `content` (first data row is 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    RowAdded {
        sheet_key: String,
        row_index: usize,
    },
    RowRemoved {
        sheet_key: String,
        row_index: usize,
        removed_row: Row,
    },
    CellModified {
        sheet_key: String,
        row_index: usize,
        col_index: usize,
        old_value: CellValue,
        new_value: CellValue,
    },
    TableRemoved {
        sheet_key: String,
    },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::RowAdded { .. } => ChangeKind::RowAdded,
            Self::RowRemoved { .. } => ChangeKind::RowRemoved,
            Self::CellModified { .. } => ChangeKind::CellModified,
            Self::TableRemoved { .. } => ChangeKind::TableRemoved,
        }
    }

    pub fn sheet_key(&self) -> &str {
        match self {
            Self::RowAdded { sheet_key, .. }
            | Self::RowRemoved { sheet_key, .. }
            | Self::CellModified { sheet_key, .. }
            | Self::TableRemoved { sheet_key } => sheet_key,
        }
    }

    pub fn row_index(&self) -> Option<usize> {
        match self {
            Self::RowAdded { row_index, .. }
            | Self::RowRemoved { row_index, .. }
            | Self::CellModified { row_index, .. } => Some(*row_index),
            Self::TableRemoved { .. } => None,
        }
    }
}

/// Every change needed to turn `snapshot` into `live`.
///
/// Sheets are visited in key order, rows in position order, and cells left to
/// right; removed tables come last.
pub fn diff(snapshot: &TableSet, live: &TableSet) -> Vec<Change> {
    let mut changes = Vec::new();

    for (key, live_sheet) in live {
        match snapshot.get(key) {
            Some(snap_sheet) => diff_sheet(key, snap_sheet, live_sheet, &mut changes),
            None => changes.extend(live_sheet.data_rows().map(|(row_index, _)| Change::RowAdded {
                sheet_key: key.clone(),
                row_index,
            })),
        }
    }

    for key in snapshot.keys().filter(|k| !live.contains_key(*k)) {
        changes.push(Change::TableRemoved {
            sheet_key: key.clone(),
        });
    }

    changes
}

fn diff_sheet(key: &str, snapshot: &Sheet, live: &Sheet, out: &mut Vec<Change>) {
    for (row_index, live_row) in live.data_rows() {
        let Some(snap_row) = snapshot.content.get(row_index) else {
            out.push(Change::RowAdded {
                sheet_key: key.to_string(),
                row_index,
            });
            continue;
        };
        let width = live_row.len().max(snap_row.len());
        for col_index in FIRST_DATA_COLUMN..width {
            let old_value = snap_row.get(col_index).cloned().unwrap_or(CellValue::Null);
            let new_value = live_row.get(col_index).cloned().unwrap_or(CellValue::Null);
            if cell_text(&old_value) != cell_text(&new_value) {
                out.push(Change::CellModified {
                    sheet_key: key.to_string(),
                    row_index,
                    col_index,
                    old_value,
                    new_value,
                });
            }
        }
    }

    let first_excess = live.content.len().max(HEADER_ROW + 1);
    for (row_index, removed) in snapshot.content.iter().enumerate().skip(first_excess) {
        out.push(Change::RowRemoved {
            sheet_key: key.to_string(),
            row_index,
            removed_row: removed.clone(),
        });
    }
}
