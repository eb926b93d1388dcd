//! Sheetguard engine.
//!
//! Validates bulk-overwritten table sets against configurable rules and runs
//! the snapshot/diff review workflow around each update:
//!
//! - [`validation`]: rule model, per-type predicates, the violation walker
//!   and smart-fix suggestions.
//! - [`preset`] / [`registry`]: named rule collections and the effective
//!   rule list with per-rule overrides.
//! - [`snapshot`] / [`diff`] / [`review`]: the confirmed baseline, positional
//!   diffing and the intercept/resolve state machine.
//! - [`store`]: the key-value persistence port.
//! - [`workbench`]: one facade tying the above to a store.

pub mod diff;
pub mod error;
pub mod hashing;
pub mod preset;
pub mod registry;
pub mod review;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod validation;
pub mod workbench;

pub use error::CoreError;
pub use workbench::Workbench;
