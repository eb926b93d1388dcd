//! Walks a table set and applies the evaluator for every applicable rule.
//!
//! Two entry points share one walker:
//! - [`validate_all_data`] for the review surface: every violation, no early
//!   exit.
//! - [`check_table_rules`] for intercept: only intercept-flagged rules, and at
//!   most one violation per rule.

use serde_json::Value;

use super::evaluator::{check_sequence, check_table_rule, FieldCheck};
use super::rules::{Rule, RuleConfig, RuleScope, Severity, Violation, TABLE_ROW};
use crate::types::{find_sheet, CellValue, Sheet, TableSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Exhaustive,
    FirstFailure,
}

/// Evaluate every rule in `rules` against `tables` and return all violations.
///
/// `snapshot` is the confirmed table set used by `TableReadonly` rules.
/// Callers pass only the rules they want applied (normally the enabled ones).
pub fn validate_all_data(
    tables: &TableSet,
    snapshot: Option<&TableSet>,
    rules: &[Rule],
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for rule in rules {
        evaluate_rule(rule, tables, snapshot, Mode::Exhaustive, &mut violations);
    }
    violations
}

/// Evaluate the intercept-flagged subset of `rules` against an incoming update.
///
/// Field rules stop at their first violating row.
pub fn check_table_rules(
    snapshot: Option<&TableSet>,
    new_data: &TableSet,
    rules: &[Rule],
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for rule in rules.iter().filter(|r| r.intercept) {
        evaluate_rule(rule, new_data, snapshot, Mode::FirstFailure, &mut violations);
    }
    violations
}

/// Number of violations with error severity.
pub fn error_count(violations: &[Violation]) -> usize {
    violations
        .iter()
        .filter(|v| v.severity == Severity::Error)
        .count()
}

fn evaluate_rule(
    rule: &Rule,
    tables: &TableSet,
    snapshot: Option<&TableSet>,
    mode: Mode,
    out: &mut Vec<Violation>,
) {
    match rule.scope {
        RuleScope::Field => evaluate_field_rule(rule, tables, mode, out),
        RuleScope::Table => evaluate_table_rule(rule, tables, snapshot, out),
    }
}

fn evaluate_field_rule(rule: &Rule, tables: &TableSet, mode: Mode, out: &mut Vec<Violation>) {
    let Some((_, sheet)) = find_sheet(tables, &rule.target_table) else {
        tracing::debug!(rule_id = %rule.id, table = %rule.target_table, "Target table absent, rule skipped");
        return;
    };
    let Some(column) = rule.target_column.as_deref() else {
        return;
    };
    let Some(col) = sheet.column_index(column) else {
        tracing::debug!(rule_id = %rule.id, table = %sheet.name, column, "Target column absent, rule skipped");
        return;
    };

    let check = FieldCheck::new(rule, tables);
    for (row_index, row) in sheet.data_rows() {
        let value = row.get(col).cloned().unwrap_or(CellValue::Null);
        if check.passes(&value) {
            continue;
        }
        out.push(violation(rule, &sheet.name, row_index as i64, value));
        if mode == Mode::FirstFailure {
            break;
        }
    }
}

fn evaluate_table_rule(
    rule: &Rule,
    tables: &TableSet,
    snapshot: Option<&TableSet>,
    out: &mut Vec<Violation>,
) {
    let before = snapshot.and_then(|s| find_sheet(s, &rule.target_table)).map(|(_, s)| s);
    let Some((_, sheet)) = find_sheet(tables, &rule.target_table) else {
        // Deleting a protected table is itself a modification.
        if matches!(rule.config, RuleConfig::TableReadonly) && before.is_some() {
            out.push(violation(rule, &rule.target_table, TABLE_ROW, Value::Null));
        }
        return;
    };

    if !check_table_rule(rule, sheet, before) {
        out.push(violation(rule, &sheet.name, TABLE_ROW, table_value(rule, sheet)));
        return;
    }

    if let RuleConfig::Sequence {
        prefix,
        start_from,
        paired_table: Some(paired),
    } = &rule.config
    {
        let column = rule.target_column.as_deref().unwrap_or_default();
        let Some((_, paired_sheet)) = find_sheet(tables, paired) else {
            return;
        };
        if let Some(col) = paired_sheet.column_index(column) {
            if !check_sequence(paired_sheet, col, prefix, *start_from) {
                out.push(violation(rule, &paired_sheet.name, TABLE_ROW, Value::Null));
            }
        }
    }
}

/// What a table-scope violation reports as its current value.
fn table_value(rule: &Rule, sheet: &Sheet) -> Value {
    match rule.config {
        RuleConfig::RowLimit { .. } => Value::from(sheet.data_row_count()),
        _ => Value::Null,
    }
}

fn violation(rule: &Rule, table: &str, row_index: i64, current_value: Value) -> Violation {
    Violation {
        rule_id: rule.id.clone(),
        rule_type: rule.kind(),
        table: table.to_string(),
        row_index,
        column_name: rule.target_column.clone(),
        current_value,
        message: message_for(rule),
        severity: rule.severity,
    }
}

fn message_for(rule: &Rule) -> String {
    if rule.error_message.trim().is_empty() {
        format!("Rule '{}' ({}) failed", rule.name, rule.kind())
    } else {
        rule.error_message.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::rules::RuleKind;
    use serde_json::json;

    fn rule(id: &str, scope: RuleScope, column: Option<&str>, config: RuleConfig) -> Rule {
        Rule {
            id: id.into(),
            name: id.into(),
            scope,
            target_table: "Events".into(),
            target_column: column.map(str::to_string),
            config,
            error_message: format!("{id} failed"),
            severity: Severity::Error,
            builtin: false,
            intercept: false,
        }
    }

    fn tables(ids: &[&str]) -> TableSet {
        let mut content = vec![vec![json!(null), json!("ID"), json!("Status")]];
        for (i, id) in ids.iter().enumerate() {
            content.push(vec![json!(i), json!(id), json!("bogus")]);
        }
        let mut t = TableSet::new();
        t.insert("sheet_events".into(), Sheet::new("Events", content));
        t
    }

    fn status_enum() -> Rule {
        rule(
            "status",
            RuleScope::Field,
            Some("Status"),
            RuleConfig::Enum {
                values: vec!["open".into()],
            },
        )
    }

    #[test]
    fn validate_all_reports_every_failing_row() {
        let violations = validate_all_data(&tables(&["E1", "E2", "E3"]), None, &[status_enum()]);
        assert_eq!(violations.len(), 3);
        assert_eq!(violations[0].row_index, 1);
        assert_eq!(violations[2].row_index, 3);
        assert_eq!(violations[0].column_name.as_deref(), Some("Status"));
        assert_eq!(violations[0].current_value, json!("bogus"));
        assert_eq!(violations[0].message, "status failed");
        assert_eq!(error_count(&violations), 3);
    }

    #[test]
    fn intercept_checks_only_flagged_rules_and_bails_early() {
        let data = tables(&["E1", "E2"]);
        assert!(check_table_rules(None, &data, &[status_enum()]).is_empty());

        let mut flagged = status_enum();
        flagged.intercept = true;
        let violations = check_table_rules(None, &data, &[flagged]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].row_index, 1);
    }

    #[test]
    fn missing_column_or_table_skips_rule() {
        let missing_col = rule("m", RuleScope::Field, Some("Nope"), RuleConfig::Required);
        let mut missing_table = rule("t", RuleScope::Field, Some("ID"), RuleConfig::Required);
        missing_table.target_table = "Ghost".into();
        let violations = validate_all_data(&tables(&[""]), None, &[missing_col, missing_table]);
        assert!(violations.is_empty());
    }

    #[test]
    fn table_scope_violations_use_table_row() {
        let limit = rule(
            "limit",
            RuleScope::Table,
            None,
            RuleConfig::RowLimit {
                min: None,
                max: Some(1),
            },
        );
        let violations = validate_all_data(&tables(&["E1", "E2"]), None, &[limit]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].row_index, TABLE_ROW);
        assert_eq!(violations[0].rule_type, RuleKind::RowLimit);
        assert_eq!(violations[0].current_value, json!(2));
    }

    #[test]
    fn readonly_flags_edits_and_deletion() {
        let readonly = rule("ro", RuleScope::Table, None, RuleConfig::TableReadonly);
        let before = tables(&["E1"]);
        let after = tables(&["E1", "E2"]);
        assert_eq!(validate_all_data(&after, Some(&before), &[readonly.clone()]).len(), 1);
        assert!(validate_all_data(&before, Some(&before), &[readonly.clone()]).is_empty());
        assert_eq!(
            validate_all_data(&TableSet::new(), Some(&before), &[readonly]).len(),
            1
        );
    }

    #[test]
    fn sequence_rule_checks_paired_table() {
        let mut data = tables(&["E1", "E2"]);
        let mut paired = data["sheet_events"].clone();
        paired.name = "Archive".into();
        paired.content[2][1] = json!("E5");
        data.insert("sheet_archive".into(), paired);

        let seq = rule(
            "seq",
            RuleScope::Table,
            Some("ID"),
            RuleConfig::Sequence {
                prefix: "E".into(),
                start_from: 1,
                paired_table: Some("Archive".into()),
            },
        );
        let violations = validate_all_data(&data, None, &[seq]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].table, "Archive");
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut warn = status_enum();
        warn.severity = Severity::Warning;
        let violations = validate_all_data(&tables(&["E1"]), None, &[warn]);
        assert_eq!(violations.len(), 1);
        assert_eq!(error_count(&violations), 0);
    }

    #[test]
    fn empty_error_message_falls_back_to_rule_name() {
        let mut r = status_enum();
        r.error_message.clear();
        let violations = validate_all_data(&tables(&["E1"]), None, &[r]);
        assert_eq!(violations[0].message, "Rule 'status' (enum) failed");
    }
}
