//! Effective rule resolution.
//!
//! The registry merges the active preset's rules with the per-rule overrides
//! the operator toggled. Overrides live outside the presets so toggling a
//! built-in rule never rewrites its stored defaults. State is held explicitly
//! and refreshed with [`RuleRegistry::reload`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::preset::{Preset, PresetExport, PresetStore};
use crate::store::{self, KvStore, KEY_RULE_OVERRIDES};
use crate::validation::Rule;

/// Per-rule toggles keyed by rule id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOverrides {
    #[serde(default)]
    pub enabled: BTreeMap<String, bool>,
    #[serde(default)]
    pub intercept: BTreeMap<String, bool>,
}

impl RuleOverrides {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.intercept.is_empty()
    }
}

/// A rule with its overrides applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveRule {
    #[serde(flatten)]
    pub rule: Rule,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    presets: PresetStore,
    overrides: RuleOverrides,
}

impl RuleRegistry {
    pub fn load(store: &mut dyn KvStore) -> Self {
        let presets = PresetStore::load(store);
        let overrides = store::load_or_default(&*store, KEY_RULE_OVERRIDES);
        Self { presets, overrides }
    }

    /// Discard in-memory state and re-read presets and overrides.
    pub fn reload(&mut self, store: &mut dyn KvStore) {
        *self = Self::load(store);
        tracing::debug!(
            active_preset = %self.presets.active_id(),
            "Rule registry reloaded"
        );
    }

    pub fn save_presets(&self, store: &mut dyn KvStore) -> Result<(), CoreError> {
        self.presets.save(store)
    }

    pub fn save_overrides(&self, store: &mut dyn KvStore) -> Result<(), CoreError> {
        store::save_with_eviction(store, KEY_RULE_OVERRIDES, &self.overrides)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Effective rules
    // ---------------------------------------------------------------------

    pub fn active_preset(&self) -> &Preset {
        self.presets.active_preset()
    }

    /// The active preset's rules, in preset order, with overrides applied.
    pub fn effective_rules(&self) -> Vec<EffectiveRule> {
        self.active_preset()
            .rules
            .iter()
            .map(|rule| {
                let mut rule = rule.clone();
                if let Some(&intercept) = self.overrides.intercept.get(&rule.id) {
                    rule.intercept = intercept;
                }
                let enabled = self.overrides.enabled.get(&rule.id).copied().unwrap_or(true);
                EffectiveRule { rule, enabled }
            })
            .collect()
    }

    pub fn enabled_rules(&self) -> Vec<Rule> {
        self.effective_rules()
            .into_iter()
            .filter(|r| r.enabled)
            .map(|r| r.rule)
            .collect()
    }

    /// Enabled rules targeting the table named `table`.
    pub fn rules_for_table(&self, table: &str) -> Vec<Rule> {
        self.enabled_rules()
            .into_iter()
            .filter(|r| r.targets(table))
            .collect()
    }

    pub fn find_rule(&self, rule_id: &str) -> Option<Rule> {
        self.effective_rules()
            .into_iter()
            .find(|r| r.rule.id == rule_id)
            .map(|r| r.rule)
    }

    // ---------------------------------------------------------------------
    // Overrides
    // ---------------------------------------------------------------------

    pub fn overrides(&self) -> &RuleOverrides {
        &self.overrides
    }

    pub fn set_rule_enabled(&mut self, rule_id: &str, enabled: bool) -> Result<(), CoreError> {
        self.ensure_rule(rule_id)?;
        self.overrides.enabled.insert(rule_id.to_string(), enabled);
        tracing::info!(rule_id, enabled, "Rule enabled state changed");
        Ok(())
    }

    pub fn set_rule_intercept(&mut self, rule_id: &str, intercept: bool) -> Result<(), CoreError> {
        self.ensure_rule(rule_id)?;
        self.overrides.intercept.insert(rule_id.to_string(), intercept);
        tracing::info!(rule_id, intercept, "Rule intercept flag changed");
        Ok(())
    }

    pub fn reset_overrides(&mut self) {
        self.overrides = RuleOverrides::default();
        tracing::info!("Rule overrides reset");
    }

    fn ensure_rule(&self, rule_id: &str) -> Result<(), CoreError> {
        match self.active_preset().rule(rule_id) {
            Some(_) => Ok(()),
            None => Err(CoreError::not_found("Rule", rule_id)),
        }
    }

    // ---------------------------------------------------------------------
    // Presets
    // ---------------------------------------------------------------------

    pub fn presets(&self) -> &PresetStore {
        &self.presets
    }

    pub fn presets_mut(&mut self) -> &mut PresetStore {
        &mut self.presets
    }

    pub fn set_active_preset(&mut self, id: &str) -> bool {
        let switched = self.presets.set_active_preset(id);
        if switched {
            tracing::info!(preset_id = id, "Active preset changed");
        }
        switched
    }

    pub fn export_preset(&self, id: &str) -> Result<PresetExport, CoreError> {
        self.presets.export_preset(id)
    }
}
