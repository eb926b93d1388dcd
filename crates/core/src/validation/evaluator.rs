//! Rule evaluator: pure predicates with no persistence access.
//!
//! Every predicate returns `true` when the value passes. Empty values pass
//! every field rule except `Required`; a rule that cannot judge its input
//! (bad pattern, unparsable number, missing reference table) passes too.

use std::collections::HashSet;

use regex::Regex;

use super::rules::{KeyValueType, Rule, RuleConfig};
use crate::types::{cell_text, find_sheet, is_blank, CellValue, Sheet, TableSet};

/// Characters after which the numeric part of a value starts.
pub(crate) const NUMERIC_SEPARATORS: &[char] = &[':', '\u{FF1A}', '/'];

// ---------------------------------------------------------------------------
// Field predicates
// ---------------------------------------------------------------------------

/// Value matches `pattern`. A pattern that fails to compile passes everything.
pub fn check_format(value: &str, pattern: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(value),
        Err(_) => true,
    }
}

/// Value is one of `values` (compared after trimming).
pub fn check_enum(value: &str, values: &[String]) -> bool {
    let value = value.trim();
    values.iter().any(|v| v.trim() == value)
}

/// Pull the numeric portion out of a cell.
///
/// Handles bare numbers, `N%`, `N/M` and `label:N`; the numeric portion is
/// whatever follows the last separator.
pub fn extract_number(value: &str) -> Option<f64> {
    let tail = value
        .rsplit(NUMERIC_SEPARATORS)
        .next()
        .unwrap_or(value)
        .trim();
    let tail = tail.strip_suffix('%').unwrap_or(tail).trim();
    tail.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric portion lies within `[min, max]`. Unparsable values pass.
pub fn check_numeric(value: &str, min: Option<f64>, max: Option<f64>) -> bool {
    match extract_number(value) {
        Some(n) => in_range(n, min, max),
        None => true,
    }
}

/// Value appears in any of `columns` of the reference table.
///
/// A missing or empty reference table passes.
pub fn check_relation(value: &str, tables: &TableSet, ref_table: &str, columns: &[String]) -> bool {
    match relation_values(tables, ref_table, columns) {
        Some(allowed) => allowed.contains(value.trim()),
        None => true,
    }
}

/// Non-null and non-empty after trimming.
pub fn check_required(value: &CellValue) -> bool {
    !is_blank(value)
}

/// ASCII form of a full-width character or CJK space/comma/full stop.
pub fn half_width(c: char) -> char {
    match c {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        '\u{3000}' => ' ',
        '\u{3001}' => ',',
        '\u{3002}' => '.',
        other => other,
    }
}

/// Normalize a key-value cell: full-width characters become their ASCII
/// equivalents and all whitespace is removed.
pub fn normalize_key_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(half_width)
        .collect()
}

/// Split a normalized `key:value;key:value` string into pairs.
///
/// Returns `None` if any segment lacks a key, a value, or the `:` separator.
/// Empty segments (e.g. a trailing `;`) are ignored.
pub fn parse_key_value(normalized: &str) -> Option<Vec<(String, String)>> {
    normalized
        .split(';')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (key, value) = segment.split_once(':')?;
            if key.is_empty() || value.is_empty() {
                None
            } else {
                Some((key.to_string(), value.to_string()))
            }
        })
        .collect()
}

/// Value parses as key-value pairs; numeric-valued rules also check each
/// value is a plain number within `[min, max]`.
pub fn check_key_value(
    value: &str,
    value_type: KeyValueType,
    min: Option<f64>,
    max: Option<f64>,
) -> bool {
    let normalized = normalize_key_value(value);
    let Some(pairs) = parse_key_value(&normalized) else {
        return false;
    };
    if pairs.is_empty() {
        return false;
    }
    match value_type {
        KeyValueType::Text => true,
        KeyValueType::Number => pairs.iter().all(|(_, v)| {
            is_plain_number(v) && v.parse::<f64>().is_ok_and(|n| in_range(n, min, max))
        }),
    }
}

// ---------------------------------------------------------------------------
// Table predicates
// ---------------------------------------------------------------------------

/// Live content is structurally identical to the snapshot's.
///
/// With no snapshot of the table there is nothing to protect, so it passes.
pub fn check_table_readonly(snapshot: Option<&Sheet>, live: &Sheet) -> bool {
    snapshot.is_none_or(|before| before.content == live.content)
}

/// Data-row count lies within `[min, max]`.
pub fn check_row_limit(sheet: &Sheet, min: Option<usize>, max: Option<usize>) -> bool {
    let rows = sheet.data_row_count();
    min.is_none_or(|min| rows >= min) && max.is_none_or(|max| rows <= max)
}

/// Values of column `col` form the run `start_from, start_from + 1, ...` in
/// row order, with no duplicates.
///
/// Only values shaped like `<prefix><digits>` take part; blank or unparsable
/// cells are skipped rather than treated as gaps.
pub fn check_sequence(sheet: &Sheet, col: usize, prefix: &str, start_from: u64) -> bool {
    let numbers = sequence_numbers(sheet, col, prefix);
    let mut seen = HashSet::new();
    numbers.iter().enumerate().all(|(offset, (_, n))| {
        seen.insert(*n) && start_from.checked_add(offset as u64) == Some(*n)
    })
}

/// Every `(row_index, number)` in column `col` matching `<prefix><digits>`,
/// in row order.
pub fn sequence_numbers(sheet: &Sheet, col: usize, prefix: &str) -> Vec<(usize, u64)> {
    let Ok(re) = Regex::new(&format!(r"^{}(\d+)$", regex::escape(prefix.trim()))) else {
        return Vec::new();
    };
    let mut numbers: Vec<(usize, u64)> = sheet
        .data_rows()
        .filter_map(|(idx, row)| {
            let text = row.get(col).map(cell_text)?;
            let caps = re.captures(text.trim())?;
            let n = caps.get(1)?.as_str().parse::<u64>().ok()?;
            Some((idx, n))
        })
        .collect();
    numbers.sort_by_key(|(idx, _)| *idx);
    numbers
}

// ---------------------------------------------------------------------------
// Prepared field checks
// ---------------------------------------------------------------------------

/// A field rule prepared once per evaluation pass.
///
/// Compiles the format pattern and gathers relation values up front so that
/// checking each row is cheap. Table-scope rules never produce a `FieldCheck`.
pub struct FieldCheck<'a> {
    rule: &'a Rule,
    pattern: Option<Regex>,
    allowed: Option<HashSet<String>>,
}

impl<'a> FieldCheck<'a> {
    pub fn new(rule: &'a Rule, tables: &TableSet) -> Self {
        let pattern = match &rule.config {
            RuleConfig::Format { pattern } => Regex::new(pattern).ok(),
            _ => None,
        };
        let allowed = match &rule.config {
            RuleConfig::Relation {
                ref_table,
                ref_columns,
            } => relation_values(tables, ref_table, ref_columns),
            _ => None,
        };
        Self {
            rule,
            pattern,
            allowed,
        }
    }

    pub fn rule(&self) -> &'a Rule {
        self.rule
    }

    /// Whether `value` passes this rule.
    pub fn passes(&self, value: &CellValue) -> bool {
        if let RuleConfig::Required = self.rule.config {
            return check_required(value);
        }
        if is_blank(value) {
            return true;
        }
        let text = cell_text(value);
        match &self.rule.config {
            RuleConfig::Format { .. } => self.pattern.as_ref().is_none_or(|re| re.is_match(&text)),
            RuleConfig::Enum { values } => check_enum(&text, values),
            RuleConfig::Numeric { min, max } => check_numeric(&text, *min, *max),
            RuleConfig::Relation { .. } => self
                .allowed
                .as_ref()
                .is_none_or(|allowed| allowed.contains(text.trim())),
            RuleConfig::KeyValue {
                value_type,
                min,
                max,
            } => check_key_value(&text, *value_type, *min, *max),
            RuleConfig::Required => check_required(value),
            RuleConfig::TableReadonly | RuleConfig::RowLimit { .. } | RuleConfig::Sequence { .. } => {
                true
            }
        }
    }
}

/// Evaluate a table-scope rule against `live`.
///
/// `snapshot` is the confirmed version of the same sheet, if any. Field rules
/// pass trivially here.
pub fn check_table_rule(rule: &Rule, live: &Sheet, snapshot: Option<&Sheet>) -> bool {
    match &rule.config {
        RuleConfig::TableReadonly => check_table_readonly(snapshot, live),
        RuleConfig::RowLimit { min, max } => check_row_limit(live, *min, *max),
        RuleConfig::Sequence {
            prefix, start_from, ..
        } => {
            let Some(col) = rule.target_column.as_deref().and_then(|c| live.column_index(c)) else {
                return true;
            };
            check_sequence(live, col, prefix, *start_from)
        }
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn in_range(n: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.is_none_or(|min| n >= min) && max.is_none_or(|max| n <= max)
}

fn is_plain_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let frac = parts.next();
    !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && frac.is_none_or(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

/// Union of the trimmed values in `columns` of the reference table.
///
/// `None` when the table is absent, has no data rows, or none of the columns
/// exist; callers treat that as "cannot judge".
fn relation_values(tables: &TableSet, ref_table: &str, columns: &[String]) -> Option<HashSet<String>> {
    let (_, sheet) = find_sheet(tables, ref_table)?;
    if sheet.data_row_count() == 0 {
        return None;
    }
    let indices: Vec<usize> = columns.iter().filter_map(|c| sheet.column_index(c)).collect();
    if indices.is_empty() {
        return None;
    }
    Some(
        indices
            .into_iter()
            .flat_map(move |col| sheet.column_values(col))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect(),
    )
}
