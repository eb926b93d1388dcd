use std::sync::Arc;

use sheetguard_core::snapshot::{ContextProvider, SharedContext};
use sheetguard_core::store::KvStore;
use sheetguard_core::Workbench;
use sheetguard_events::{EventBus, ReviewEvent};
use tokio::sync::Mutex;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; everything lives behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The engine. The mutex serializes every entry point so only one
    /// update or resolution is in flight at a time.
    pub workbench: Arc<Mutex<Workbench>>,
    /// Current context id, read by the snapshot store on every access.
    pub context: SharedContext,
    pub config: Arc<ServerConfig>,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Open a workbench over `store` starting in the configured context.
    pub fn new(store: Box<dyn KvStore>, config: ServerConfig, event_bus: Arc<EventBus>) -> Self {
        let context = SharedContext::new(config.default_context_id.clone());
        let workbench = Workbench::open(store, Arc::new(context.clone()));
        Self {
            workbench: Arc::new(Mutex::new(workbench)),
            context,
            config: Arc::new(config),
            event_bus,
        }
    }

    /// Publish an event tagged with the current context.
    pub fn publish(&self, event: ReviewEvent) {
        self.event_bus
            .publish(event.with_context(self.context.current_context()));
    }
}
