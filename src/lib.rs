//! keyscope - keybinding resolution and scope management
//!
//! This library turns raw key presses into application actions: a registry
//! of built-in bindings, user customization with forward-compatible
//! persistence, refcounted scope activation, chord and two-key-sequence
//! interpretation, deterministic dispatch, conflict detection, and
//! platform-aware display formatting.

pub mod builtins;
pub mod config;
pub mod conflict;
pub mod customize;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod format;
pub mod interpreter;
pub mod keys;
pub mod logging;
pub mod registry;
pub mod resolve;
pub mod scope;
pub mod store;

pub use config::EngineConfig;
pub use conflict::{Conflict, ConflictKind};
pub use customize::{Customization, CustomizationSet};
pub use dispatch::{ActionEvent, ActionHandler};
pub use engine::{CheatSheetSection, Engine, Handled};
pub use keys::{Chord, KeyParseError, KeySpec, Platform, RawKeyEvent};
pub use registry::{BindingDefinition, BindingId, Category, Registry};
pub use resolve::ResolvedBinding;
pub use scope::{Scope, ScopeController, ScopeToken};
pub use store::{CustomizationStore, JsonFileStore};


#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
