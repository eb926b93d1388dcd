//! Last confirmed table set, tagged with the context it belongs to.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::store::{self, KvStore, KEY_SNAPSHOT};
use crate::types::TableSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub context_id: String,
    #[serde(default)]
    pub sheets: TableSet,
}

/// Identity of the current conversation or session.
pub trait ContextProvider: Send + Sync {
    fn current_context(&self) -> String;
}

impl<F> ContextProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn current_context(&self) -> String {
        self()
    }
}

/// A context id that can be switched at runtime and read from many places.
#[derive(Debug, Clone)]
pub struct SharedContext(Arc<RwLock<String>>);

impl SharedContext {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(context_id.into())))
    }

    pub fn set(&self, context_id: impl Into<String>) {
        let mut guard = self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = context_id.into();
    }
}

impl ContextProvider for SharedContext {
    fn current_context(&self) -> String {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Reads and writes the snapshot through the persistence port, consulting the
/// context provider on every call.
pub struct SnapshotStore {
    context: Arc<dyn ContextProvider>,
}

impl SnapshotStore {
    pub fn new(context: Arc<dyn ContextProvider>) -> Self {
        Self { context }
    }

    pub fn context_id(&self) -> String {
        self.context.current_context()
    }

    /// The snapshot for the current context. A snapshot written under any
    /// other context reads as absent.
    pub fn load(&self, store: &dyn KvStore) -> Option<Snapshot> {
        let snapshot: Snapshot = store::load(store, KEY_SNAPSHOT)?;
        let current = self.context_id();
        if snapshot.context_id != current {
            tracing::debug!(
                stored = %snapshot.context_id,
                current = %current,
                "Snapshot belongs to another context, ignoring"
            );
            return None;
        }
        Some(snapshot)
    }

    /// Persist `sheets` as the snapshot, stamped with the current context.
    pub fn save(&self, store: &mut dyn KvStore, sheets: &TableSet) -> Result<Snapshot, CoreError> {
        let snapshot = Snapshot {
            context_id: self.context_id(),
            sheets: sheets.clone(),
        };
        store::save_with_eviction(store, KEY_SNAPSHOT, &snapshot)?;
        Ok(snapshot)
    }

    /// Persist a snapshot object, overwriting whatever context tag it carried.
    pub fn save_snapshot(
        &self,
        store: &mut dyn KvStore,
        mut snapshot: Snapshot,
    ) -> Result<Snapshot, CoreError> {
        snapshot.context_id = self.context_id();
        store::save_with_eviction(store, KEY_SNAPSHOT, &snapshot)?;
        Ok(snapshot)
    }

    pub fn clear(&self, store: &mut dyn KvStore) -> Result<(), CoreError> {
        store.remove(KEY_SNAPSHOT)?;
        Ok(())
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("context_id", &self.context_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Sheet;
    use serde_json::json;

    fn tables() -> TableSet {
        let mut t = TableSet::new();
        t.insert(
            "sheet_0".into(),
            Sheet::new("Global", vec![vec![json!(null), json!("Day")], vec![json!(0), json!(1)]]),
        );
        t
    }

    #[test]
    fn snapshot_is_isolated_per_context() {
        let context = SharedContext::new("chat-A");
        let snapshots = SnapshotStore::new(Arc::new(context.clone()));
        let mut store = MemoryStore::new();

        snapshots.save(&mut store, &tables()).unwrap();
        assert_eq!(snapshots.load(&store).unwrap().sheets, tables());

        context.set("chat-B");
        assert!(snapshots.load(&store).is_none());

        context.set("chat-A");
        assert!(snapshots.load(&store).is_some());
    }

    #[test]
    fn save_restamps_foreign_context() {
        let snapshots = SnapshotStore::new(Arc::new(|| "chat-A".to_string()));
        let mut store = MemoryStore::new();
        let foreign = Snapshot {
            context_id: "chat-Z".into(),
            sheets: tables(),
        };
        let saved = snapshots.save_snapshot(&mut store, foreign).unwrap();
        assert_eq!(saved.context_id, "chat-A");
        assert_eq!(snapshots.load(&store).unwrap().context_id, "chat-A");
    }

    #[test]
    fn clear_and_garbage_read_as_absent() {
        let snapshots = SnapshotStore::new(Arc::new(SharedContext::new("c")));
        let mut store = MemoryStore::new();
        snapshots.save(&mut store, &tables()).unwrap();
        snapshots.clear(&mut store).unwrap();
        assert!(snapshots.load(&store).is_none());

        store.set(KEY_SNAPSHOT, json!([1, 2, 3])).unwrap();
        assert!(snapshots.load(&store).is_none());
    }
}
