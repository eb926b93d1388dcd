//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`; publishers never wait on
//! subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Dot-separated event names published by the service.
pub mod event_types {
    pub const UPDATE_BASELINED: &str = "update.baselined";
    pub const UPDATE_STAGED: &str = "update.staged";
    pub const UPDATE_ROLLED_BACK: &str = "update.rolled_back";
    pub const UPDATE_REJECTED: &str = "update.rejected";

    pub const CHANGE_ACCEPTED: &str = "change.accepted";
    pub const CHANGE_REJECTED: &str = "change.rejected";
    pub const CHANGE_RESTORED: &str = "change.restored";
    pub const CHANGES_ACCEPTED_ALL: &str = "changes.accepted_all";
    pub const CHANGES_REJECTED_ALL: &str = "changes.rejected_all";

    pub const VIOLATION_REVERTED: &str = "violation.reverted";
    pub const FIX_APPLIED: &str = "fix.applied";

    pub const CONTEXT_SWITCHED: &str = "context.switched";

    pub const PRESET_ACTIVATED: &str = "preset.activated";
    pub const PRESET_CHANGED: &str = "preset.changed";
    pub const PRESET_DELETED: &str = "preset.deleted";
    pub const RULE_OVERRIDE_CHANGED: &str = "rule.override_changed";
}

// ---------------------------------------------------------------------------
// ReviewEvent
// ---------------------------------------------------------------------------

/// Something that happened to the live table set, the snapshot or the rules.
///
/// Built with [`ReviewEvent::new`] plus the `with_*` methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    /// One of the [`event_types`] names.
    pub event_type: String,

    /// Context the event happened in, when it concerns table data.
    pub context_id: Option<String>,

    /// Sheet the event concerns, if any.
    pub sheet_key: Option<String>,

    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl ReviewEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            context_id: None,
            sheet_key: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    pub fn with_sheet(mut self, sheet_key: impl Into<String>) -> Self {
        self.sheet_key = Some(sheet_key.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus; every subscriber sees every event published after it
/// subscribed.
pub struct EventBus {
    sender: broadcast::Sender<ReviewEvent>,
}

impl EventBus {
    /// Create a bus whose slowest receiver may fall `capacity` events behind
    /// before it observes `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped if there are none.
    pub fn publish(&self, event: ReviewEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
