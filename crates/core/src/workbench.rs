//! Facade wiring the registry, snapshot store and review controller to one
//! persistence port.
//!
//! Every mutating call writes its result back through the port before
//! returning. Callers in a concurrent host must serialize access.

use std::sync::Arc;

use crate::diff::Change;
use crate::error::CoreError;
use crate::preset::{Preset, PresetExport, PresetStore};
use crate::registry::{EffectiveRule, RuleRegistry};
use crate::review::{ChangeTarget, ReviewController, ReviewPhase, UpdateOutcome};
use crate::snapshot::{ContextProvider, SnapshotStore};
use crate::store::{self, KvStore, KEY_LIVE};
use crate::types::{cell_text, CellValue, TableSet};
use crate::validation::smart_fix::{self, FixOptions};
use crate::validation::{error_count, validate_all_data, Rule, Violation};

pub struct Workbench {
    store: Box<dyn KvStore>,
    registry: RuleRegistry,
    snapshots: SnapshotStore,
    controller: ReviewController,
    loaded_context: String,
}

impl Workbench {
    pub fn open(mut store: Box<dyn KvStore>, context: Arc<dyn ContextProvider>) -> Self {
        let registry = RuleRegistry::load(&mut *store);
        let snapshots = SnapshotStore::new(context);
        let loaded_context = snapshots.context_id();
        let live: TableSet = store::load_or_default(&*store, KEY_LIVE);
        let snapshot = snapshots.load(&*store).map(|s| s.sheets);
        tracing::info!(
            context_id = %loaded_context,
            sheets = live.len(),
            has_snapshot = snapshot.is_some(),
            "Workbench opened"
        );
        Self {
            store,
            registry,
            snapshots,
            controller: ReviewController::new(live, snapshot),
            loaded_context,
        }
    }

    /// Re-read rules, overrides, live state and snapshot from the store.
    pub fn reload(&mut self) {
        self.registry.reload(&mut *self.store);
        self.reload_tables();
    }

    fn reload_tables(&mut self) {
        self.loaded_context = self.snapshots.context_id();
        let live: TableSet = store::load_or_default(&*self.store, KEY_LIVE);
        let snapshot = self.snapshots.load(&*self.store).map(|s| s.sheets);
        self.controller.reset(live, snapshot);
    }

    /// Pick up a context switch made through the provider.
    fn sync_context(&mut self) {
        if self.snapshots.context_id() != self.loaded_context {
            tracing::info!(
                from = %self.loaded_context,
                to = %self.snapshots.context_id(),
                "Context changed, reloading snapshot"
            );
            self.reload_tables();
        }
    }

    pub fn context_id(&self) -> String {
        self.snapshots.context_id()
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    /// Feed an externally sourced table set through the review controller.
    pub fn ingest_update(&mut self, tables: TableSet) -> Result<UpdateOutcome, CoreError> {
        self.sync_context();
        let rules = self.registry.enabled_rules();
        let outcome = self.controller.process_update(tables, &rules);

        match &outcome {
            UpdateOutcome::Baselined => {
                self.persist_snapshot()?;
                self.persist_live()?;
            }
            UpdateOutcome::RolledBack { .. } => {
                let written = self.persist_live();
                self.controller.finish_rollback();
                written?;
            }
            UpdateOutcome::Staged { .. } => self.persist_live()?,
            UpdateOutcome::Rejected => {}
        }
        Ok(outcome)
    }

    pub fn phase(&self) -> ReviewPhase {
        self.controller.phase()
    }

    pub fn live(&self) -> &TableSet {
        self.controller.live()
    }

    pub fn snapshot(&mut self) -> Option<&TableSet> {
        self.sync_context();
        self.controller.snapshot()
    }

    pub fn pending_changes(&mut self) -> Vec<Change> {
        self.sync_context();
        self.controller.pending_changes()
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    pub fn accept(&mut self, target: &ChangeTarget) -> Result<(), CoreError> {
        self.sync_context();
        self.controller.accept(target)?;
        self.persist_snapshot()
    }

    pub fn reject(&mut self, target: &ChangeTarget) -> Result<(), CoreError> {
        self.sync_context();
        self.controller.reject(target)?;
        self.persist_live()
    }

    pub fn restore(&mut self, target: &ChangeTarget) -> Result<(), CoreError> {
        self.sync_context();
        self.controller.restore(target)?;
        self.persist_live()
    }

    pub fn accept_all(&mut self) -> Result<(), CoreError> {
        self.sync_context();
        self.controller.accept_all();
        self.persist_snapshot()
    }

    pub fn reject_all(&mut self) -> Result<(), CoreError> {
        self.sync_context();
        self.controller.reject_all()?;
        self.persist_live()
    }

    // -----------------------------------------------------------------------
    // Violations
    // -----------------------------------------------------------------------

    /// Every enabled rule evaluated against the live state.
    pub fn violations(&mut self) -> Vec<Violation> {
        self.sync_context();
        let rules = self.registry.enabled_rules();
        validate_all_data(self.controller.live(), self.controller.snapshot(), &rules)
    }

    pub fn error_count(&mut self) -> usize {
        error_count(&self.violations())
    }

    pub fn revert_violation(&mut self, violation: &Violation) -> Result<ChangeTarget, CoreError> {
        self.sync_context();
        let target = self.controller.revert_violation(violation)?;
        self.persist_live()?;
        Ok(target)
    }

    pub fn apply_fix(&mut self, target: &ChangeTarget, value: CellValue) -> Result<(), CoreError> {
        self.sync_context();
        self.controller.apply_fix(target, value)?;
        self.persist_live()
    }

    /// Suggestions for the cell a rule targets in `sheet_key` at `row_index`.
    pub fn suggest_fixes(
        &self,
        rule_id: &str,
        sheet_key: &str,
        row_index: usize,
    ) -> Result<FixOptions, CoreError> {
        let rule = self
            .registry
            .find_rule(rule_id)
            .ok_or_else(|| CoreError::not_found("Rule", rule_id))?;
        let live = self.controller.live();
        let sheet = live
            .get(sheet_key)
            .ok_or_else(|| CoreError::not_found("Sheet", sheet_key))?;
        let value = rule
            .target_column
            .as_deref()
            .and_then(|column| sheet.column_index(column))
            .and_then(|col| sheet.cell(row_index, col))
            .map(cell_text)
            .unwrap_or_default();
        Ok(smart_fix::suggest_fixes(&rule, &value, live))
    }

    // -----------------------------------------------------------------------
    // Rules and overrides
    // -----------------------------------------------------------------------

    pub fn effective_rules(&self) -> Vec<EffectiveRule> {
        self.registry.effective_rules()
    }

    pub fn rules_for_table(&self, table: &str) -> Vec<Rule> {
        self.registry.rules_for_table(table)
    }

    pub fn set_rule_enabled(&mut self, rule_id: &str, enabled: bool) -> Result<(), CoreError> {
        self.registry.set_rule_enabled(rule_id, enabled)?;
        self.registry.save_overrides(&mut *self.store)
    }

    pub fn set_rule_intercept(&mut self, rule_id: &str, intercept: bool) -> Result<(), CoreError> {
        self.registry.set_rule_intercept(rule_id, intercept)?;
        self.registry.save_overrides(&mut *self.store)
    }

    pub fn reset_overrides(&mut self) -> Result<(), CoreError> {
        self.registry.reset_overrides();
        self.registry.save_overrides(&mut *self.store)
    }

    // -----------------------------------------------------------------------
    // Presets
    // -----------------------------------------------------------------------

    pub fn presets(&self) -> &PresetStore {
        self.registry.presets()
    }

    pub fn active_preset(&self) -> &Preset {
        self.registry.active_preset()
    }

    pub fn set_active_preset(&mut self, id: &str) -> Result<bool, CoreError> {
        if !self.registry.set_active_preset(id) {
            return Ok(false);
        }
        self.registry.save_presets(&mut *self.store)?;
        Ok(true)
    }

    pub fn create_preset(&mut self, name: &str) -> Result<Preset, CoreError> {
        self.edit_presets(|presets| presets.create_preset(name))
    }

    pub fn duplicate_preset(&mut self, id: &str, name: &str) -> Result<Preset, CoreError> {
        self.edit_presets(|presets| presets.duplicate_preset(id, name))
    }

    pub fn rename_preset(&mut self, id: &str, name: &str) -> Result<Preset, CoreError> {
        self.edit_presets(|presets| presets.rename_preset(id, name))
    }

    pub fn delete_preset(&mut self, id: &str) -> Result<(), CoreError> {
        self.edit_presets(|presets| presets.delete_preset(id))
    }

    pub fn add_rule(&mut self, preset_id: &str, rule: Rule) -> Result<Rule, CoreError> {
        self.edit_presets(|presets| presets.add_rule(preset_id, rule))
    }

    pub fn update_rule(
        &mut self,
        preset_id: &str,
        rule_id: &str,
        rule: Rule,
    ) -> Result<Rule, CoreError> {
        self.edit_presets(|presets| presets.update_rule(preset_id, rule_id, rule))
    }

    pub fn remove_rule(&mut self, preset_id: &str, rule_id: &str) -> Result<Rule, CoreError> {
        self.edit_presets(|presets| presets.remove_rule(preset_id, rule_id))
    }

    pub fn export_preset(&self, id: &str) -> Result<PresetExport, CoreError> {
        self.registry.export_preset(id)
    }

    pub fn import_preset(&mut self, export: PresetExport) -> Result<Preset, CoreError> {
        self.edit_presets(|presets| presets.import_preset(export))
    }

    /// Apply a preset edit and persist the preset list if it succeeded.
    fn edit_presets<T>(
        &mut self,
        edit: impl FnOnce(&mut PresetStore) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let result = edit(self.registry.presets_mut())?;
        self.registry.save_presets(&mut *self.store)?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn persist_live(&mut self) -> Result<(), CoreError> {
        store::save_with_eviction(&mut *self.store, KEY_LIVE, self.controller.live())?;
        Ok(())
    }

    fn persist_snapshot(&mut self) -> Result<(), CoreError> {
        if let Some(sheets) = self.controller.snapshot() {
            self.snapshots.save(&mut *self.store, sheets)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Workbench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbench")
            .field("context", &self.loaded_context)
            .field("phase", &self.controller.phase())
            .field("active_preset", &self.registry.active_preset().id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::DEFAULT_PRESET_ID;
    use crate::snapshot::SharedContext;
    use crate::store::{MemoryStore, KEY_SNAPSHOT};
    use crate::types::Sheet;
    use crate::validation::smart_fix::FixKind;
    use assert_matches::assert_matches;
    use serde_json::json;

    const SEQUENCE_RULE: &str = "builtin-event-sequence";
    const STATUS_RULE: &str = "builtin-task-status";

    fn tables(event_ids: &[&str], status: &str) -> TableSet {
        let mut events = vec![vec![json!(null), json!("ID")]];
        for (i, id) in event_ids.iter().enumerate() {
            events.push(vec![json!(i), json!(id)]);
        }
        let mut t = TableSet::new();
        t.insert("sheet_0".into(), Sheet::new("Events", events));
        t.insert(
            "sheet_1".into(),
            Sheet::new(
                "Tasks",
                vec![
                    vec![json!(null), json!("Title"), json!("Status")],
                    vec![json!(0), json!("Find the key"), json!(status)],
                ],
            ),
        );
        t
    }

    fn workbench(context: &SharedContext) -> Workbench {
        Workbench::open(Box::new(MemoryStore::new()), Arc::new(context.clone()))
    }

    #[test]
    fn first_update_baselines_then_stages() {
        let mut wb = workbench(&SharedContext::new("chat-A"));
        assert_eq!(
            wb.ingest_update(tables(&["EV1"], "active")).unwrap(),
            UpdateOutcome::Baselined
        );
        let outcome = wb.ingest_update(tables(&["EV1", "EV2"], "active")).unwrap();
        assert_matches!(outcome, UpdateOutcome::Staged { changes } if changes.len() == 1);
        assert_eq!(wb.pending_changes().len(), 1);
    }

    #[test]
    fn intercept_override_triggers_rollback() {
        let mut wb = workbench(&SharedContext::new("chat-A"));
        wb.set_rule_intercept(SEQUENCE_RULE, true).unwrap();
        wb.ingest_update(tables(&["EV1"], "active")).unwrap();

        let outcome = wb.ingest_update(tables(&["EV1", "EV3"], "active")).unwrap();
        assert_matches!(outcome, UpdateOutcome::RolledBack { violation } if violation.rule_id == SEQUENCE_RULE);
        assert_eq!(wb.live(), &tables(&["EV1"], "active"));
        assert_eq!(wb.phase(), ReviewPhase::Idle);

        // Disabled rules never intercept.
        wb.set_rule_enabled(SEQUENCE_RULE, false).unwrap();
        assert_matches!(
            wb.ingest_update(tables(&["EV1", "EV3"], "active")).unwrap(),
            UpdateOutcome::Staged { .. }
        );
    }

    #[test]
    fn violations_and_error_count_follow_enabled_rules() {
        let mut wb = workbench(&SharedContext::new("c"));
        wb.ingest_update(tables(&["EV1"], "bogus")).unwrap();
        let violations = wb.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, STATUS_RULE);
        assert_eq!(wb.error_count(), 1);

        wb.set_rule_enabled(STATUS_RULE, false).unwrap();
        assert_eq!(wb.error_count(), 0);
        wb.reset_overrides().unwrap();
        assert_eq!(wb.error_count(), 1);
    }

    #[test]
    fn suggest_and_apply_fix() {
        let mut wb = workbench(&SharedContext::new("c"));
        wb.ingest_update(tables(&["EV1"], "Act")).unwrap();
        let options = wb.suggest_fixes(STATUS_RULE, "sheet_1", 1).unwrap();
        assert_eq!(options.kind, FixKind::Choice);
        assert_eq!(options.suggestions[0], "active");

        wb.apply_fix(&ChangeTarget::cell("sheet_1", 1, 2), json!("active"))
            .unwrap();
        assert!(wb.violations().is_empty());
        assert_matches!(
            wb.suggest_fixes("ghost", "sheet_1", 1),
            Err(CoreError::NotFound { .. })
        );
    }

    #[test]
    fn revert_violation_restores_snapshot_value() {
        let mut wb = workbench(&SharedContext::new("c"));
        wb.ingest_update(tables(&["EV1"], "done")).unwrap();
        wb.ingest_update(tables(&["EV1"], "bogus")).unwrap();
        let violation = wb.violations().remove(0);
        wb.revert_violation(&violation).unwrap();
        assert!(wb.violations().is_empty());
        assert!(wb.pending_changes().is_empty());
    }

    #[test]
    fn context_switch_hides_other_snapshot() {
        let context = SharedContext::new("chat-A");
        let mut wb = workbench(&context);
        wb.ingest_update(tables(&["EV1"], "done")).unwrap();
        assert!(wb.snapshot().is_some());

        context.set("chat-B");
        assert!(wb.snapshot().is_none());
        assert_eq!(
            wb.ingest_update(tables(&["EV1"], "done")).unwrap(),
            UpdateOutcome::Baselined
        );
    }

    #[test]
    fn state_survives_reopen() {
        let context = SharedContext::new("c");
        let mut wb = workbench(&context);
        wb.ingest_update(tables(&["EV1"], "done")).unwrap();
        wb.ingest_update(tables(&["EV1", "EV2"], "done")).unwrap();
        let preset = wb.create_preset("Strict").unwrap();
        wb.set_active_preset(&preset.id).unwrap();

        let store = std::mem::replace(&mut wb.store, Box::new(MemoryStore::new()));
        let reopened = Workbench::open(store, Arc::new(context));
        assert_eq!(reopened.live(), &tables(&["EV1", "EV2"], "done"));
        assert_eq!(reopened.active_preset().id, preset.id);
        assert!(reopened.effective_rules().is_empty());
    }

    #[test]
    fn accept_all_persists_snapshot() {
        let mut wb = workbench(&SharedContext::new("c"));
        wb.ingest_update(tables(&["EV1"], "done")).unwrap();
        wb.ingest_update(tables(&["EV1", "EV2"], "done")).unwrap();
        wb.accept_all().unwrap();
        assert!(wb.pending_changes().is_empty());

        let stored = wb.store.get(KEY_SNAPSHOT).unwrap();
        assert_eq!(stored["sheets"]["sheet_0"]["content"][2][1], json!("EV2"));
    }

    #[test]
    fn preset_edits_are_persisted() {
        let mut wb = workbench(&SharedContext::new("c"));
        let copy = wb.duplicate_preset(DEFAULT_PRESET_ID, "Copy").unwrap();
        wb.rename_preset(&copy.id, "Renamed").unwrap();
        assert_eq!(wb.presets().get(&copy.id).unwrap().name, "Renamed");
        assert!(!wb.set_active_preset("missing").unwrap());

        wb.reload();
        assert_eq!(wb.presets().presets().len(), 2);
        wb.delete_preset(&copy.id).unwrap();
        wb.reload();
        assert_eq!(wb.presets().presets().len(), 1);
    }
}
