//! Deterministic fix suggestions for a violating cell.
//!
//! Offers candidates the operator can pick from; nothing here writes to the
//! table set.

use regex::Regex;
use serde::Serialize;

use super::evaluator::{
    check_format, check_key_value, extract_number, half_width, normalize_key_value,
    NUMERIC_SEPARATORS,
};
use super::rules::{Rule, RuleConfig};
use crate::types::{find_sheet, TableSet};

/// Maximum number of suggestions returned for open-ended lists.
pub const MAX_SUGGESTIONS: usize = 20;

/// How the editor should present the suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    /// Free-text edit, suggestions are hints.
    FreeText,
    /// Pick one of a closed set of values.
    Choice,
    /// No automatic help; the operator edits the table by hand.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixOptions {
    pub kind: FixKind,
    pub suggestions: Vec<String>,
}

/// Suggest replacements for `value` under `rule`.
pub fn suggest_fixes(rule: &Rule, value: &str, tables: &TableSet) -> FixOptions {
    match &rule.config {
        RuleConfig::Format { pattern } => FixOptions {
            kind: FixKind::FreeText,
            suggestions: format_candidates(value, pattern),
        },
        RuleConfig::Enum { values } => FixOptions {
            kind: FixKind::Choice,
            suggestions: rank_by_similarity(value, values.iter().cloned()),
        },
        RuleConfig::Relation {
            ref_table,
            ref_columns,
        } => FixOptions {
            kind: FixKind::Choice,
            suggestions: relation_candidates(value, tables, ref_table, ref_columns),
        },
        RuleConfig::Numeric { min, max } => FixOptions {
            kind: FixKind::FreeText,
            suggestions: clamp_candidate(value, *min, *max).into_iter().collect(),
        },
        RuleConfig::KeyValue {
            value_type,
            min,
            max,
        } => {
            let normalized = normalize_key_value(value);
            let fixed = normalized != value
                && check_key_value(&normalized, *value_type, *min, *max);
            FixOptions {
                kind: FixKind::FreeText,
                suggestions: if fixed { vec![normalized] } else { Vec::new() },
            }
        }
        RuleConfig::Required => FixOptions {
            kind: FixKind::FreeText,
            suggestions: Vec::new(),
        },
        RuleConfig::TableReadonly | RuleConfig::RowLimit { .. } | RuleConfig::Sequence { .. } => {
            FixOptions {
                kind: FixKind::Manual,
                suggestions: Vec::new(),
            }
        }
    }
}

/// Simple rewrites of `value` that satisfy `pattern`.
fn format_candidates(value: &str, pattern: &str) -> Vec<String> {
    let narrow: String = value.chars().map(half_width).collect();
    let mut candidates = vec![
        value.trim().to_string(),
        narrow.trim().to_string(),
        narrow.trim().to_uppercase(),
        narrow.trim().to_lowercase(),
    ];
    if let Some(padded) = zero_padded(&narrow, pattern) {
        candidates.push(padded);
    }

    let mut out: Vec<String> = Vec::new();
    for candidate in candidates {
        if candidate != value
            && !candidate.is_empty()
            && check_format(&candidate, pattern)
            && !out.contains(&candidate)
        {
            out.push(candidate);
        }
    }
    out
}

/// For patterns shaped like `^PREFIX\d{n}$`, pad the digits of `value`.
fn zero_padded(value: &str, pattern: &str) -> Option<String> {
    let shape = Regex::new(r"^\^?([A-Za-z_\-]*)\\d\{(\d+)\}\$?$").ok()?;
    let caps = shape.captures(pattern)?;
    let prefix = caps.get(1)?.as_str();
    let width: usize = caps.get(2)?.as_str().parse().ok()?;
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.len() > width {
        return None;
    }
    Some(format!("{prefix}{digits:0>width$}"))
}

fn relation_candidates(
    value: &str,
    tables: &TableSet,
    ref_table: &str,
    columns: &[String],
) -> Vec<String> {
    let Some((_, sheet)) = find_sheet(tables, ref_table) else {
        return Vec::new();
    };
    let mut values: Vec<String> = Vec::new();
    for col in columns.iter().filter_map(|c| sheet.column_index(c)) {
        for v in sheet.column_values(col) {
            let v = v.trim().to_string();
            if !v.is_empty() && !values.contains(&v) {
                values.push(v);
            }
        }
    }
    let mut ranked = rank_by_similarity(value, values);
    ranked.truncate(MAX_SUGGESTIONS);
    ranked
}

/// Order `candidates` so that exact-insensitive, prefix and substring matches
/// of `value` come first; ties keep their original order.
fn rank_by_similarity(value: &str, candidates: impl IntoIterator<Item = String>) -> Vec<String> {
    let needle = value.trim().to_lowercase();
    let mut ranked: Vec<(u8, String)> = candidates
        .into_iter()
        .map(|c| {
            let hay = c.to_lowercase();
            let score = if needle.is_empty() {
                3
            } else if hay == needle {
                0
            } else if hay.starts_with(&needle) || needle.starts_with(&hay) {
                1
            } else if hay.contains(&needle) || needle.contains(&hay) {
                2
            } else {
                3
            };
            (score, c)
        })
        .collect();
    ranked.sort_by_key(|(score, _)| *score);
    ranked.into_iter().map(|(_, c)| c).collect()
}

/// `value` with its numeric portion clamped into range. The label before the
/// last separator and a trailing `%` are kept.
fn clamp_candidate(value: &str, min: Option<f64>, max: Option<f64>) -> Option<String> {
    let n = extract_number(value)?;
    let clamped = match (min, max) {
        (Some(min), _) if n < min => min,
        (_, Some(max)) if n > max => max,
        _ => return None,
    };
    let value = value.trim();
    let label = value
        .rmatch_indices(NUMERIC_SEPARATORS)
        .next()
        .map_or("", |(at, sep)| &value[..at + sep.len()]);
    let percent = if value.ends_with('%') { "%" } else { "" };
    Some(format!("{label}{}{percent}", format_number(clamped)))
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sheet;
    use crate::validation::rules::{KeyValueType, RuleScope, Severity};
    use serde_json::json;

    fn rule(config: RuleConfig) -> Rule {
        Rule {
            id: "r".into(),
            name: "r".into(),
            scope: RuleScope::Field,
            target_table: "T".into(),
            target_column: Some("C".into()),
            config,
            error_message: String::new(),
            severity: Severity::Error,
            builtin: false,
            intercept: false,
        }
    }

    #[test]
    fn format_suggests_padded_and_half_width_forms() {
        let r = rule(RuleConfig::Format {
            pattern: r"^AM\d{3}$".into(),
        });
        let opts = suggest_fixes(&r, "am7", &TableSet::new());
        assert_eq!(opts.kind, FixKind::FreeText);
        assert_eq!(opts.suggestions, vec!["AM007".to_string()]);

        let opts = suggest_fixes(&r, "ＡＭ００１ ", &TableSet::new());
        assert_eq!(opts.suggestions, vec!["AM001".to_string()]);
    }

    #[test]
    fn enum_ranks_closest_first() {
        let r = rule(RuleConfig::Enum {
            values: vec!["pending".into(), "active".into(), "done".into()],
        });
        let opts = suggest_fixes(&r, "Act", &TableSet::new());
        assert_eq!(opts.kind, FixKind::Choice);
        assert_eq!(opts.suggestions[0], "active");
        assert_eq!(opts.suggestions.len(), 3);
    }

    #[test]
    fn relation_lists_reference_values() {
        let mut tables = TableSet::new();
        tables.insert(
            "chars".into(),
            Sheet::new(
                "Characters",
                vec![
                    vec![json!(null), json!("Name")],
                    vec![json!(0), json!("Ayla")],
                    vec![json!(1), json!("Bren")],
                    vec![json!(2), json!("Ayla")],
                ],
            ),
        );
        let r = rule(RuleConfig::Relation {
            ref_table: "Characters".into(),
            ref_columns: vec!["Name".into()],
        });
        let opts = suggest_fixes(&r, "bre", &tables);
        assert_eq!(opts.suggestions, vec!["Bren".to_string(), "Ayla".to_string()]);
    }

    #[test]
    fn numeric_clamps_into_range() {
        let r = rule(RuleConfig::Numeric {
            min: Some(0.0),
            max: Some(100.0),
        });
        assert_eq!(suggest_fixes(&r, "140", &TableSet::new()).suggestions, vec!["100"]);
        assert_eq!(suggest_fixes(&r, "-3", &TableSet::new()).suggestions, vec!["0"]);
        assert!(suggest_fixes(&r, "50", &TableSet::new()).suggestions.is_empty());
    }

    #[test]
    fn numeric_clamp_keeps_label_and_percent() {
        let r = rule(RuleConfig::Numeric {
            min: Some(0.0),
            max: Some(100.0),
        });
        let clamp = |v: &str| suggest_fixes(&r, v, &TableSet::new()).suggestions;
        assert_eq!(clamp("HP:140"), vec!["HP:100"]);
        assert_eq!(clamp("体力：140"), vec!["体力：100"]);
        assert_eq!(clamp("120%"), vec!["100%"]);
        assert_eq!(clamp("3/140"), vec!["3/100"]);
    }

    #[test]
    fn half_width_is_shared_with_key_value_normalization() {
        assert_eq!(half_width('Ａ'), 'A');
        assert_eq!(half_width('\u{3000}'), ' ');
        assert_eq!(normalize_key_value("ＨＰ：１０"), "HP:10");
    }

    #[test]
    fn key_value_offers_normalized_form() {
        let r = rule(RuleConfig::KeyValue {
            value_type: KeyValueType::Number,
            min: None,
            max: None,
        });
        let opts = suggest_fixes(&r, "力量：80； 敏捷：70", &TableSet::new());
        assert_eq!(opts.suggestions, vec!["力量:80;敏捷:70".to_string()]);
    }

    #[test]
    fn table_rules_are_manual() {
        let r = rule(RuleConfig::TableReadonly);
        assert_eq!(suggest_fixes(&r, "", &TableSet::new()).kind, FixKind::Manual);
    }
}
