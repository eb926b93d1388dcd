//! Named rule collections ("presets") and the built-in default preset.
//!
//! Exactly one preset is active at a time. The preset with id
//! [`DEFAULT_PRESET_ID`] always exists, cannot be deleted, and carries the
//! built-in rules. When the built-in rule list changes between releases its
//! fingerprint changes too, and [`upgrade_builtin_rules`] replaces the stored
//! built-in subset while keeping user-added rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::hashing::rules_fingerprint;
use crate::store::{self, KvStore, KEY_ACTIVE_PRESET, KEY_PRESETS};
use crate::validation::rules::{validate_rule, KeyValueType, Rule, RuleConfig, RuleScope, Severity};

/* --------------------------------------------------------------------------
   Constants
   -------------------------------------------------------------------------- */

/// Id of the built-in preset. Never deletable.
pub const DEFAULT_PRESET_ID: &str = "default";

/// Format tag carried by exported preset JSON.
pub const PRESET_FORMAT: &str = "rule-preset-v1";

/// Maximum length for a preset name.
pub const MAX_PRESET_NAME_LEN: usize = 200;

/// Suffix given to a user rule whose id collides with a new built-in rule.
const COLLISION_SUFFIX: &str = "-custom";

/* --------------------------------------------------------------------------
   Types
   -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub builtin: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Fingerprint of the built-in rules this preset was last upgraded to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin_version: Option<String>,
}

impl Preset {
    pub fn rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }
}

/// Portable preset JSON: `{ format, name, rules }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetExport {
    pub format: String,
    pub name: String,
    pub rules: Vec<Rule>,
}

/// Outcome of a built-in rule upgrade, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub rules_before: usize,
    pub builtin_before: usize,
    pub builtin_after: usize,
    pub user_rules: usize,
    pub rules_after: usize,
}

/* --------------------------------------------------------------------------
   Built-in rules
   -------------------------------------------------------------------------- */

fn builtin(
    id: &str,
    name: &str,
    scope: RuleScope,
    table: &str,
    column: Option<&str>,
    config: RuleConfig,
    message: &str,
) -> Rule {
    Rule {
        id: id.to_string(),
        name: name.to_string(),
        scope,
        target_table: table.to_string(),
        target_column: column.map(str::to_string),
        config,
        error_message: message.to_string(),
        severity: Severity::Error,
        builtin: true,
        intercept: false,
    }
}

/// The rules shipped with the default preset.
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        builtin(
            "builtin-global-single-row",
            "Global state has one row",
            RuleScope::Table,
            "Global",
            None,
            RuleConfig::RowLimit {
                min: Some(1),
                max: Some(1),
            },
            "The Global table must contain exactly one row",
        ),
        builtin(
            "builtin-character-name-required",
            "Character name required",
            RuleScope::Field,
            "Characters",
            Some("Name"),
            RuleConfig::Required,
            "Every character needs a name",
        ),
        builtin(
            "builtin-character-attributes",
            "Character attributes are key:value numbers",
            RuleScope::Field,
            "Characters",
            Some("Attributes"),
            RuleConfig::KeyValue {
                value_type: KeyValueType::Number,
                min: Some(0.0),
                max: Some(100.0),
            },
            "Attributes must look like 'Strength:80;Agility:70' with values 0-100",
        ),
        builtin(
            "builtin-task-status",
            "Task status is a known state",
            RuleScope::Field,
            "Tasks",
            Some("Status"),
            RuleConfig::Enum {
                values: vec![
                    "pending".to_string(),
                    "active".to_string(),
                    "done".to_string(),
                    "failed".to_string(),
                ],
            },
            "Task status must be one of pending, active, done, failed",
        ),
        builtin(
            "builtin-item-owner",
            "Item owner is a known character",
            RuleScope::Field,
            "Items",
            Some("Owner"),
            RuleConfig::Relation {
                ref_table: "Characters".to_string(),
                ref_columns: vec!["Name".to_string()],
            },
            "Item owner must name a row of the Characters table",
        ),
        builtin(
            "builtin-event-sequence",
            "Event ids are sequential",
            RuleScope::Table,
            "Events",
            Some("ID"),
            RuleConfig::Sequence {
                prefix: "EV".to_string(),
                start_from: 1,
                paired_table: None,
            },
            "Event ids must run EV1, EV2, ... without gaps or duplicates",
        ),
    ]
}

/// The default preset as shipped, stamped with the current built-in version.
pub fn default_preset() -> Preset {
    let rules = builtin_rules();
    Preset {
        id: DEFAULT_PRESET_ID.to_string(),
        name: "Default".to_string(),
        builtin: true,
        builtin_version: Some(rules_fingerprint(&rules)),
        rules,
    }
}

/// Replace the built-in subset of `preset` with `current` if its version
/// stamp differs from `current`'s fingerprint.
///
/// User-added rules are kept, after the built-in ones and in their original
/// order. A user rule whose id collides with a new built-in id is renamed.
/// Returns `None` when the preset is already up to date.
pub fn upgrade_builtin_rules(preset: &mut Preset, current: &[Rule]) -> Option<MigrationReport> {
    let stamp = rules_fingerprint(current);
    if preset.builtin_version.as_deref() == Some(stamp.as_str()) {
        return None;
    }

    let rules_before = preset.rules.len();
    let builtin_before = preset.rules.iter().filter(|r| r.builtin).count();
    let builtin_ids: HashSet<&str> = current.iter().map(|r| r.id.as_str()).collect();

    let mut user_rules: Vec<Rule> = preset.rules.drain(..).filter(|r| !r.builtin).collect();
    for rule in &mut user_rules {
        if builtin_ids.contains(rule.id.as_str()) {
            rule.id = format!("{}{COLLISION_SUFFIX}", rule.id);
        }
    }

    let user_count = user_rules.len();
    preset.rules = current.to_vec();
    preset.rules.extend(user_rules);
    preset.builtin_version = Some(stamp);

    let report = MigrationReport {
        rules_before,
        builtin_before,
        builtin_after: current.len(),
        user_rules: user_count,
        rules_after: preset.rules.len(),
    };
    tracing::info!(
        preset_id = %preset.id,
        rules_before = report.rules_before,
        builtin_before = report.builtin_before,
        builtin_after = report.builtin_after,
        user_rules = report.user_rules,
        "Upgraded built-in rules"
    );
    Some(report)
}

/* --------------------------------------------------------------------------
   Validation helpers
   -------------------------------------------------------------------------- */

/// Validate a preset name: non-empty and within length limit.
pub fn validate_preset_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Preset name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_PRESET_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Preset name too long: {} chars (max {MAX_PRESET_NAME_LEN})",
            name.len()
        )));
    }
    Ok(())
}

/// Validate every rule of a list and check id uniqueness.
fn validate_rule_set(rules: &[Rule]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for rule in rules {
        validate_rule(rule)?;
        if !seen.insert(rule.id.as_str()) {
            return Err(CoreError::Conflict(format!(
                "Duplicate rule id '{}'",
                rule.id
            )));
        }
    }
    Ok(())
}

fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

/* --------------------------------------------------------------------------
   PresetStore
   -------------------------------------------------------------------------- */

/// Owns every preset and the active-preset pointer.
#[derive(Debug, Clone)]
pub struct PresetStore {
    presets: Vec<Preset>,
    active_id: String,
}

impl Default for PresetStore {
    fn default() -> Self {
        Self {
            presets: vec![default_preset()],
            active_id: DEFAULT_PRESET_ID.to_string(),
        }
    }
}

impl PresetStore {
    /// Load presets from `store`, creating or upgrading the default preset as
    /// needed and persisting the result if anything changed.
    pub fn load(store: &mut dyn KvStore) -> Self {
        let mut presets: Vec<Preset> = store::load_or_default(&*store, KEY_PRESETS);
        let mut changed = false;

        match presets.iter().position(|p| p.id == DEFAULT_PRESET_ID) {
            Some(0) => {}
            Some(pos) => {
                let default = presets.remove(pos);
                presets.insert(0, default);
            }
            None => {
                presets.insert(0, default_preset());
                changed = true;
            }
        }
        presets[0].builtin = true;
        if upgrade_builtin_rules(&mut presets[0], &builtin_rules()).is_some() {
            changed = true;
        }

        let stored_active: Option<String> = store::load(&*store, KEY_ACTIVE_PRESET);
        let active_id = match stored_active {
            Some(id) if presets.iter().any(|p| p.id == id) => id,
            _ => DEFAULT_PRESET_ID.to_string(),
        };

        let loaded = Self { presets, active_id };
        if changed {
            if let Err(err) = loaded.save(store) {
                tracing::warn!(error = %err, "Failed to persist upgraded presets");
            }
        }
        loaded
    }

    /// Persist all presets and the active pointer.
    pub fn save(&self, store: &mut dyn KvStore) -> Result<(), CoreError> {
        store::save_with_eviction(store, KEY_PRESETS, &self.presets)?;
        store::save_with_eviction(store, KEY_ACTIVE_PRESET, &Value::from(self.active_id.as_str()))?;
        Ok(())
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Preset, CoreError> {
        self.presets
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::not_found("Preset", id))
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    /// The active preset. Falls back to the default preset, which always
    /// sits at position 0.
    pub fn active_preset(&self) -> &Preset {
        self.get(&self.active_id).unwrap_or(&self.presets[0])
    }

    /// Point the active preset at `id`. Returns `false` (and changes nothing)
    /// if no such preset exists.
    pub fn set_active_preset(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active_id = id.to_string();
        true
    }

    /// Create an empty, non-builtin preset.
    pub fn create_preset(&mut self, name: &str) -> Result<Preset, CoreError> {
        validate_preset_name(name)?;
        let preset = Preset {
            id: generate_id("preset"),
            name: name.trim().to_string(),
            builtin: false,
            rules: Vec::new(),
            builtin_version: None,
        };
        self.presets.push(preset.clone());
        Ok(preset)
    }

    /// Copy an existing preset's rules into a new, non-builtin preset.
    pub fn duplicate_preset(&mut self, id: &str, name: &str) -> Result<Preset, CoreError> {
        validate_preset_name(name)?;
        let source = self
            .get(id)
            .ok_or_else(|| CoreError::not_found("Preset", id))?;
        let preset = Preset {
            id: generate_id("preset"),
            name: name.trim().to_string(),
            builtin: false,
            rules: source.rules.clone(),
            builtin_version: None,
        };
        self.presets.push(preset.clone());
        Ok(preset)
    }

    pub fn rename_preset(&mut self, id: &str, name: &str) -> Result<Preset, CoreError> {
        validate_preset_name(name)?;
        let preset = self.get_mut(id)?;
        preset.name = name.trim().to_string();
        Ok(preset.clone())
    }

    /// Delete a preset. The default preset cannot be deleted. Deleting the
    /// active preset re-points the active id at the default preset.
    pub fn delete_preset(&mut self, id: &str) -> Result<(), CoreError> {
        if id == DEFAULT_PRESET_ID {
            return Err(CoreError::Validation(
                "The default preset cannot be deleted".to_string(),
            ));
        }
        let pos = self
            .presets
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| CoreError::not_found("Preset", id))?;
        self.presets.remove(pos);
        if self.active_id == id {
            self.active_id = DEFAULT_PRESET_ID.to_string();
        }
        Ok(())
    }

    /// Append a rule to a preset. An empty id is replaced by a generated one.
    pub fn add_rule(&mut self, preset_id: &str, mut rule: Rule) -> Result<Rule, CoreError> {
        if rule.id.trim().is_empty() {
            rule.id = generate_id("rule");
        }
        rule.builtin = false;
        validate_rule(&rule)?;
        let preset = self.get_mut(preset_id)?;
        if preset.rule(&rule.id).is_some() {
            return Err(CoreError::Conflict(format!(
                "Rule id '{}' already exists in preset '{preset_id}'",
                rule.id
            )));
        }
        preset.rules.push(rule.clone());
        Ok(rule)
    }

    /// Replace a rule in place. The id and built-in flag are kept.
    pub fn update_rule(
        &mut self,
        preset_id: &str,
        rule_id: &str,
        mut rule: Rule,
    ) -> Result<Rule, CoreError> {
        rule.id = rule_id.to_string();
        validate_rule(&rule)?;
        let preset = self.get_mut(preset_id)?;
        let slot = preset
            .rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| CoreError::not_found("Rule", rule_id))?;
        rule.builtin = slot.builtin;
        *slot = rule.clone();
        Ok(rule)
    }

    /// Remove a rule. Built-in rules cannot be removed from the default
    /// preset; disable them instead.
    pub fn remove_rule(&mut self, preset_id: &str, rule_id: &str) -> Result<Rule, CoreError> {
        let preset = self.get_mut(preset_id)?;
        let pos = preset
            .rules
            .iter()
            .position(|r| r.id == rule_id)
            .ok_or_else(|| CoreError::not_found("Rule", rule_id))?;
        if preset.id == DEFAULT_PRESET_ID && preset.rules[pos].builtin {
            return Err(CoreError::Validation(format!(
                "Built-in rule '{rule_id}' cannot be removed from the default preset"
            )));
        }
        Ok(preset.rules.remove(pos))
    }

    /// Export a preset as portable JSON. Built-in flags are stripped.
    pub fn export_preset(&self, id: &str) -> Result<PresetExport, CoreError> {
        let preset = self
            .get(id)
            .ok_or_else(|| CoreError::not_found("Preset", id))?;
        let rules = preset
            .rules
            .iter()
            .cloned()
            .map(|mut r| {
                r.builtin = false;
                r
            })
            .collect();
        Ok(PresetExport {
            format: PRESET_FORMAT.to_string(),
            name: preset.name.clone(),
            rules,
        })
    }

    /// Import portable preset JSON as a new, non-builtin preset.
    pub fn import_preset(&mut self, export: PresetExport) -> Result<Preset, CoreError> {
        if export.format != PRESET_FORMAT {
            return Err(CoreError::Validation(format!(
                "Unsupported preset format '{}', expected '{PRESET_FORMAT}'",
                export.format
            )));
        }
        validate_preset_name(&export.name)?;
        let rules: Vec<Rule> = export
            .rules
            .into_iter()
            .map(|mut r| {
                r.builtin = false;
                r
            })
            .collect();
        validate_rule_set(&rules)?;

        let preset = Preset {
            id: generate_id("preset"),
            name: export.name.trim().to_string(),
            builtin: false,
            rules,
            builtin_version: None,
        };
        self.presets.push(preset.clone());
        Ok(preset)
    }
}

/* --------------------------------------------------------------------------
   Tests
   -------------------------------------------------------------------------- */
