//! Sheetguard event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ReviewEvent`]: the envelope for every review and rule-management
//!   event; names live in [`event_types`].
//! - [`EventLogger`]: background task that writes every event to the log.

pub mod bus;
pub mod logger;

pub use bus::{event_types, EventBus, ReviewEvent};
pub use logger::EventLogger;
