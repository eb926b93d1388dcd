//! Review workflow: intercepting bulk updates and resolving changes.
//!
//! The controller owns the live table set and the snapshot for the current
//! context. Each externally sourced update goes through a small state machine:
//!
//! ```text
//! Idle --process_update--> Evaluating --ok--------> Idle
//!                                      \--violation--> RollingBack --finish_rollback--> Idle
//! ```
//!
//! While not `Idle` further updates are rejected, so the rollback write cannot
//! be mistaken for a fresh update and trigger a second rollback.

use serde::{Deserialize, Serialize};

use crate::diff::{diff, Change};
use crate::error::CoreError;
use crate::types::{find_sheet, CellValue, Row, Sheet, TableSet, FIRST_DATA_COLUMN, HEADER_ROW};
use crate::validation::{check_table_rules, Rule, Violation, TABLE_ROW};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPhase {
    #[default]
    Idle,
    Evaluating,
    RollingBack,
}

/// What happened to an incoming update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// First table set seen for this context; it became the snapshot.
    Baselined,
    /// An intercept rule failed; the live state was reset to the snapshot.
    RolledBack { violation: Violation },
    /// The update is live and these changes await review.
    Staged { changes: Vec<Change> },
    /// The controller was busy with a rollback; the update was dropped.
    Rejected,
}

/// Location a resolution applies to: a whole sheet, one row, or one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTarget {
    pub sheet_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_index: Option<usize>,
}

impl ChangeTarget {
    pub fn sheet(sheet_key: impl Into<String>) -> Self {
        Self {
            sheet_key: sheet_key.into(),
            row_index: None,
            col_index: None,
        }
    }

    pub fn row(sheet_key: impl Into<String>, row_index: usize) -> Self {
        Self {
            row_index: Some(row_index),
            ..Self::sheet(sheet_key)
        }
    }

    pub fn cell(sheet_key: impl Into<String>, row_index: usize, col_index: usize) -> Self {
        Self {
            col_index: Some(col_index),
            ..Self::row(sheet_key, row_index)
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.row_index == Some(HEADER_ROW) {
            return Err(CoreError::Validation(
                "The header row cannot be resolved".to_string(),
            ));
        }
        if self.col_index.is_some_and(|c| c < FIRST_DATA_COLUMN) {
            return Err(CoreError::Validation(
                "The index column cannot be resolved".to_string(),
            ));
        }
        if self.col_index.is_some() && self.row_index.is_none() {
            return Err(CoreError::Validation(
                "A column target needs a row index".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&Change> for ChangeTarget {
    fn from(change: &Change) -> Self {
        match change {
            Change::RowAdded {
                sheet_key,
                row_index,
            }
            | Change::RowRemoved {
                sheet_key,
                row_index,
                ..
            } => Self::row(sheet_key.clone(), *row_index),
            Change::CellModified {
                sheet_key,
                row_index,
                col_index,
                ..
            } => Self::cell(sheet_key.clone(), *row_index, *col_index),
            Change::TableRemoved { sheet_key } => Self::sheet(sheet_key.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReviewController {
    phase: ReviewPhase,
    live: TableSet,
    snapshot: Option<TableSet>,
}

impl ReviewController {
    pub fn new(live: TableSet, snapshot: Option<TableSet>) -> Self {
        Self {
            phase: ReviewPhase::Idle,
            live,
            snapshot,
        }
    }

    pub fn phase(&self) -> ReviewPhase {
        self.phase
    }

    pub fn live(&self) -> &TableSet {
        &self.live
    }

    pub fn snapshot(&self) -> Option<&TableSet> {
        self.snapshot.as_ref()
    }

    /// Replace both sides, e.g. after a context switch. Resets the phase.
    pub fn reset(&mut self, live: TableSet, snapshot: Option<TableSet>) {
        *self = Self::new(live, snapshot);
    }

    /// Run an incoming update through the intercept check.
    ///
    /// `rules` are the enabled rules; only intercept-flagged ones are checked.
    /// After a [`UpdateOutcome::RolledBack`] the caller persists the restored
    /// live state and then calls [`finish_rollback`](Self::finish_rollback).
    pub fn process_update(&mut self, incoming: TableSet, rules: &[Rule]) -> UpdateOutcome {
        if self.phase != ReviewPhase::Idle {
            tracing::warn!(phase = ?self.phase, "Update arrived mid-cycle, ignoring");
            return UpdateOutcome::Rejected;
        }
        self.phase = ReviewPhase::Evaluating;

        let Some(snapshot) = self.snapshot.as_ref() else {
            self.snapshot = Some(incoming.clone());
            self.live = incoming;
            self.phase = ReviewPhase::Idle;
            tracing::info!(sheets = self.live.len(), "Baseline snapshot taken");
            return UpdateOutcome::Baselined;
        };

        if let Some(violation) = check_table_rules(Some(snapshot), &incoming, rules)
            .into_iter()
            .next()
        {
            tracing::info!(
                rule_id = %violation.rule_id,
                table = %violation.table,
                row_index = violation.row_index,
                "Intercept rule failed, rolling back update"
            );
            self.live = snapshot.clone();
            self.phase = ReviewPhase::RollingBack;
            return UpdateOutcome::RolledBack { violation };
        }

        let changes = diff(snapshot, &incoming);
        self.live = incoming;
        self.phase = ReviewPhase::Idle;
        tracing::debug!(changes = changes.len(), "Update staged for review");
        UpdateOutcome::Staged { changes }
    }

    /// Acknowledge that the rollback write has landed.
    pub fn finish_rollback(&mut self) {
        if self.phase == ReviewPhase::RollingBack {
            self.phase = ReviewPhase::Idle;
        }
    }

    /// Changes between snapshot and live state; empty when there is no
    /// snapshot yet.
    pub fn pending_changes(&self) -> Vec<Change> {
        self.snapshot
            .as_ref()
            .map(|snapshot| diff(snapshot, &self.live))
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Per-change resolution
    // -----------------------------------------------------------------------

    /// Copy the live value at `target` into the snapshot.
    pub fn accept(&mut self, target: &ChangeTarget) -> Result<(), CoreError> {
        target.validate()?;
        let snapshot = self.snapshot.as_mut().ok_or_else(no_snapshot)?;
        let live_sheet = self.live.get(&target.sheet_key);

        match (target.row_index, target.col_index, live_sheet) {
            (None, _, Some(sheet)) => {
                snapshot.insert(target.sheet_key.clone(), sheet.clone());
            }
            (None, _, None) => {
                snapshot
                    .remove(&target.sheet_key)
                    .ok_or_else(|| CoreError::not_found("Sheet", &target.sheet_key))?;
            }
            (Some(_), _, None) => {
                return Err(CoreError::not_found("Sheet", &target.sheet_key));
            }
            (Some(row), col, Some(sheet)) => {
                let snap_sheet = snapshot
                    .entry(target.sheet_key.clone())
                    .or_insert_with(|| header_only(sheet));
                match sheet.content.get(row) {
                    Some(live_row) => {
                        extend_rows_through(sheet, snap_sheet, row);
                        match col {
                            Some(col) => set_cell(
                                &mut snap_sheet.content[row],
                                col,
                                live_row.get(col).cloned().unwrap_or(CellValue::Null),
                            ),
                            None => snap_sheet.content[row] = live_row.clone(),
                        }
                    }
                    // Row is gone from the live sheet. Rows are aligned by
                    // position, so every surplus row from `row` on goes too.
                    None => {
                        if row < snap_sheet.content.len() {
                            let dropped = snap_sheet.content.len() - row;
                            snap_sheet.content.truncate(row);
                            tracing::debug!(sheet_key = %target.sheet_key, row, dropped, "Removal accepted");
                        }
                    }
                }
            }
        }
        tracing::info!(sheet_key = %target.sheet_key, row = ?target.row_index, col = ?target.col_index, "Change accepted");
        Ok(())
    }

    /// Copy the snapshot value at `target` back into the live state.
    pub fn reject(&mut self, target: &ChangeTarget) -> Result<(), CoreError> {
        target.validate()?;
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(no_snapshot)?;
        let snap_sheet = snapshot.get(&target.sheet_key);

        match (target.row_index, target.col_index, snap_sheet) {
            (None, _, Some(sheet)) => {
                self.live.insert(target.sheet_key.clone(), sheet.clone());
            }
            (None, _, None) => {
                self.live
                    .remove(&target.sheet_key)
                    .ok_or_else(|| CoreError::not_found("Sheet", &target.sheet_key))?;
            }
            (Some(row), col, snap_sheet) => {
                let live_sheet = self
                    .live
                    .get_mut(&target.sheet_key)
                    .ok_or_else(|| CoreError::not_found("Sheet", &target.sheet_key))?;
                let snap_row = snap_sheet.and_then(|s| s.content.get(row).map(|r| (s, r)));
                match (snap_row, col) {
                    (Some((_, snap_row)), Some(col)) => {
                        let live_row = live_sheet
                            .content
                            .get_mut(row)
                            .ok_or_else(|| row_not_found(target, row))?;
                        set_cell(live_row, col, snap_row.get(col).cloned().unwrap_or(CellValue::Null));
                    }
                    (Some((snap_sheet, snap_row)), None) => match live_sheet.content.get_mut(row) {
                        Some(live_row) => *live_row = snap_row.clone(),
                        None => extend_rows_through(snap_sheet, live_sheet, row),
                    },
                    // Row only exists live: reverting drops it and, by
                    // position, every live row after it.
                    (None, _) => live_sheet.content.truncate(row),
                }
            }
        }
        tracing::info!(sheet_key = %target.sheet_key, row = ?target.row_index, col = ?target.col_index, "Change rejected");
        Ok(())
    }

    /// Re-insert a row or table that is present in the snapshot but missing
    /// from the live state.
    pub fn restore(&mut self, target: &ChangeTarget) -> Result<(), CoreError> {
        target.validate()?;
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(no_snapshot)?;
        let snap_sheet = snapshot
            .get(&target.sheet_key)
            .ok_or_else(|| CoreError::not_found("Sheet", &target.sheet_key))?;

        match target.row_index {
            None => {
                if self.live.contains_key(&target.sheet_key) {
                    return Err(CoreError::Conflict(format!(
                        "Sheet '{}' was not removed",
                        target.sheet_key
                    )));
                }
                self.live.insert(target.sheet_key.clone(), snap_sheet.clone());
            }
            Some(row) => {
                let snap_row = snap_sheet
                    .content
                    .get(row)
                    .ok_or_else(|| row_not_found(target, row))?;
                let live_sheet = self
                    .live
                    .get_mut(&target.sheet_key)
                    .ok_or_else(|| CoreError::Conflict(format!(
                        "Sheet '{}' was removed; restore the sheet instead",
                        target.sheet_key
                    )))?;
                match live_sheet.content.get(row) {
                    // Already back, e.g. filled in by restoring a later row.
                    Some(live_row) if live_row == snap_row => {}
                    Some(_) => {
                        return Err(CoreError::Conflict(format!(
                            "Row {row} of '{}' was not removed",
                            target.sheet_key
                        )));
                    }
                    None => extend_rows_through(snap_sheet, live_sheet, row),
                }
            }
        }
        tracing::info!(sheet_key = %target.sheet_key, row = ?target.row_index, "Change restored");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bulk resolution
    // -----------------------------------------------------------------------

    /// Promote the entire live state into the snapshot.
    pub fn accept_all(&mut self) {
        self.snapshot = Some(self.live.clone());
        tracing::info!("All changes accepted");
    }

    /// Replace the entire live state with the snapshot.
    pub fn reject_all(&mut self) -> Result<(), CoreError> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(no_snapshot)?;
        self.live = snapshot.clone();
        tracing::info!("All changes rejected");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Violation resolution
    // -----------------------------------------------------------------------

    /// Where in the live state a violation points. Table-scope violations
    /// resolve to the whole sheet.
    pub fn violation_target(&self, violation: &Violation) -> Result<ChangeTarget, CoreError> {
        let (key, sheet) = find_sheet(&self.live, &violation.table)
            .ok_or_else(|| CoreError::not_found("Sheet", &violation.table))?;
        if violation.row_index == TABLE_ROW {
            return Ok(ChangeTarget::sheet(key));
        }
        let row = usize::try_from(violation.row_index)
            .map_err(|_| CoreError::Validation(format!("Invalid row index {}", violation.row_index)))?;
        let column = violation
            .column_name
            .as_deref()
            .ok_or_else(|| CoreError::Validation("Violation has no column".to_string()))?;
        let col = sheet
            .column_index(column)
            .ok_or_else(|| CoreError::not_found("Column", column))?;
        Ok(ChangeTarget::cell(key, row, col))
    }

    /// Put the snapshot value back where a violation was reported.
    pub fn revert_violation(&mut self, violation: &Violation) -> Result<ChangeTarget, CoreError> {
        let target = self.violation_target(violation)?;
        self.reject(&target)?;
        Ok(target)
    }

    /// Write an operator-chosen value into one live cell.
    pub fn apply_fix(&mut self, target: &ChangeTarget, value: CellValue) -> Result<(), CoreError> {
        target.validate()?;
        let (Some(row), Some(col)) = (target.row_index, target.col_index) else {
            return Err(CoreError::Validation(
                "A fix needs a row and a column".to_string(),
            ));
        };
        let live_row = self
            .live
            .get_mut(&target.sheet_key)
            .ok_or_else(|| CoreError::not_found("Sheet", &target.sheet_key))?
            .content
            .get_mut(row)
            .ok_or_else(|| row_not_found(target, row))?;
        set_cell(live_row, col, value);
        tracing::info!(sheet_key = %target.sheet_key, row, col, "Fix applied");
        Ok(())
    }
}

fn header_only(sheet: &Sheet) -> Sheet {
    Sheet::new(sheet.name.clone(), sheet.content.iter().take(1).cloned().collect())
}

/// Append `source`'s rows to `target` until position `row` exists, so every
/// row keeps its original position. `source` must have a row at `row`.
fn extend_rows_through(source: &Sheet, target: &mut Sheet, row: usize) {
    let start = target.content.len();
    if start <= row {
        target
            .content
            .extend(source.content[start..=row].iter().cloned());
    }
}

fn set_cell(row: &mut Row, col: usize, value: CellValue) {
    if row.len() <= col {
        row.resize(col + 1, CellValue::Null);
    }
    row[col] = value;
}

fn no_snapshot() -> CoreError {
    CoreError::Conflict("No snapshot for the current context".to_string())
}

fn row_not_found(target: &ChangeTarget, row: usize) -> CoreError {
    CoreError::not_found("Row", format!("{}[{row}]", target.sheet_key))
}
