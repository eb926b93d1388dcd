//! Validation rule and violation types.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Whether a rule judges a single cell or an entire table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    Table,
    Field,
}

/// Whether a rule violation counts as an error or is informational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// How the values of a key-value field are judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyValueType {
    #[default]
    Text,
    Number,
}

/// Type-specific payload of a rule. The `type` tag doubles as the rule type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleConfig {
    Format {
        pattern: String,
    },
    Enum {
        values: Vec<String>,
    },
    Numeric {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Relation {
        ref_table: String,
        ref_columns: Vec<String>,
    },
    Required,
    KeyValue {
        #[serde(default)]
        value_type: KeyValueType,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    TableReadonly,
    RowLimit {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    Sequence {
        #[serde(default)]
        prefix: String,
        #[serde(default = "default_start_from")]
        start_from: u64,
        #[serde(default)]
        paired_table: Option<String>,
    },
}

fn default_start_from() -> u64 {
    1
}

/// Fieldless discriminant of [`RuleConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Format,
    Enum,
    Numeric,
    Relation,
    Required,
    KeyValue,
    TableReadonly,
    RowLimit,
    Sequence,
}

impl RuleKind {
    /// String representation for display and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Enum => "enum",
            Self::Numeric => "numeric",
            Self::Relation => "relation",
            Self::Required => "required",
            Self::KeyValue => "key_value",
            Self::TableReadonly => "table_readonly",
            Self::RowLimit => "row_limit",
            Self::Sequence => "sequence",
        }
    }

    /// The scope every rule of this kind must declare.
    pub fn scope(&self) -> RuleScope {
        match self {
            Self::TableReadonly | Self::RowLimit | Self::Sequence => RuleScope::Table,
            _ => RuleScope::Field,
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RuleConfig {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Format { .. } => RuleKind::Format,
            Self::Enum { .. } => RuleKind::Enum,
            Self::Numeric { .. } => RuleKind::Numeric,
            Self::Relation { .. } => RuleKind::Relation,
            Self::Required => RuleKind::Required,
            Self::KeyValue { .. } => RuleKind::KeyValue,
            Self::TableReadonly => RuleKind::TableReadonly,
            Self::RowLimit { .. } => RuleKind::RowLimit,
            Self::Sequence { .. } => RuleKind::Sequence,
        }
    }
}

/// One validation rule as stored in a preset.
///
/// Enabled state is not part of the rule; see
/// [`RuleOverrides`](crate::registry::RuleOverrides).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub scope: RuleScope,
    pub target_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_column: Option<String>,
    pub config: RuleConfig,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub builtin: bool,
    #[serde(default)]
    pub intercept: bool,
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        self.config.kind()
    }

    /// Whether this rule applies to the table named `table`.
    pub fn targets(&self, table: &str) -> bool {
        self.target_table == table
    }
}

/// A single rule failure against the live table set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    pub rule_type: RuleKind,
    /// Sheet name the failing rule targets.
    pub table: String,
    /// Row position inside `content`, or [`TABLE_ROW`] for table-scope rules.
    pub row_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(default)]
    pub current_value: serde_json::Value,
    pub message: String,
    pub severity: Severity,
}

/// Row index reported for table-scope violations.
pub const TABLE_ROW: i64 = -1;

/// Maximum length of a rule name.
pub const MAX_RULE_NAME_LEN: usize = 200;

/// Check a rule's structural consistency before it is stored.
pub fn validate_rule(rule: &Rule) -> Result<(), CoreError> {
    if rule.id.trim().is_empty() {
        return Err(CoreError::Validation("Rule id must not be empty".to_string()));
    }
    if rule.name.len() > MAX_RULE_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Rule name too long: {} chars (max {MAX_RULE_NAME_LEN})",
            rule.name.len()
        )));
    }
    if rule.target_table.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "Rule '{}' must name a target table",
            rule.id
        )));
    }

    let kind = rule.kind();
    if kind.scope() != rule.scope {
        return Err(CoreError::Validation(format!(
            "Rule '{}' of type '{kind}' must have {:?} scope",
            rule.id,
            kind.scope()
        )));
    }

    let needs_column = rule.scope == RuleScope::Field || kind == RuleKind::Sequence;
    let has_column = rule
        .target_column
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    if needs_column && !has_column {
        return Err(CoreError::Validation(format!(
            "Rule '{}' of type '{kind}' requires a target column",
            rule.id
        )));
    }

    match &rule.config {
        RuleConfig::Enum { values } if values.is_empty() => Err(CoreError::Validation(
            format!("Enum rule '{}' needs at least one value", rule.id),
        )),
        RuleConfig::Relation {
            ref_table,
            ref_columns,
        } if ref_table.trim().is_empty() || ref_columns.is_empty() => {
            Err(CoreError::Validation(format!(
                "Relation rule '{}' needs a reference table and at least one column",
                rule.id
            )))
        }
        RuleConfig::Numeric {
            min: Some(min),
            max: Some(max),
        }
        | RuleConfig::KeyValue {
            min: Some(min),
            max: Some(max),
            ..
        } if min > max => Err(range_error(rule)),
        RuleConfig::RowLimit {
            min: Some(min),
            max: Some(max),
        } if min > max => Err(range_error(rule)),
        _ => Ok(()),
    }
}

fn range_error(rule: &Rule) -> CoreError {
    CoreError::Validation(format!("Rule '{}' has min greater than max", rule.id))
}
