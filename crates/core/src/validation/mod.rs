//! Validation rule engine.
//!
//! Provides the rule model, pure per-type predicates, the table walker that
//! turns them into violations, and deterministic fix suggestions, all
//! without persistence dependencies.

pub mod evaluator;
pub mod rules;
pub mod runner;
pub mod smart_fix;

pub use rules::{Rule, RuleConfig, RuleKind, RuleScope, Severity, Violation, TABLE_ROW};
pub use runner::{check_table_rules, error_count, validate_all_data};
