//! Binding definitions and the definition registry.
//!
//! A [`BindingDefinition`] is a fixed fact about the application: stable id,
//! default keys, owning scope, category for cheat sheet grouping, and flags
//! for default enablement and text-input behavior. Definitions are declared
//! in code (see [`crate::builtins`]) and collected into a [`Registry`], which
//! preserves declaration order. That order is load-bearing: it is the final
//! dispatch tie-break and the display order of the cheat sheet.
//!
//! # Examples
//!
//! ```
//! use keyscope::registry::{BindingDefinition, Category, Registry};
//! use keyscope::scope::Scope;
//!
//! let defs = vec![
//!     BindingDefinition::new("palette.open", "mod+k", "Open the command palette")
//!         .scope(Scope::global())
//!         .category(Category::Actions),
//! ];
//! let registry = Registry::new(defs).unwrap();
//! assert!(registry.get("palette.open").is_some());
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::KeySpec;
use crate::scope::Scope;

// ============================================================================
// BindingId
// ============================================================================

/// Stable binding identifier, e.g. `"nav.dashboard"`. Customizations and
/// callback registrations key on it, so it must never change once shipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingId(String);

impl BindingId {
    pub fn new(id: impl Into<String>) -> Self {
        BindingId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BindingId {
    fn from(id: &str) -> Self {
        BindingId::new(id)
    }
}

impl std::borrow::Borrow<str> for BindingId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Category
// ============================================================================

/// Cheat sheet grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Navigation,
    Actions,
    Editing,
    View,
    Help,
    System,
}

impl Category {
    /// Display order for cheat sheet sections.
    pub const ALL: [Category; 6] = [
        Category::Navigation,
        Category::Actions,
        Category::Editing,
        Category::View,
        Category::Help,
        Category::System,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Navigation => "Navigation",
            Category::Actions => "Actions",
            Category::Editing => "Editing",
            Category::View => "View",
            Category::Help => "Help",
            Category::System => "System",
        }
    }
}

// ============================================================================
// BindingDefinition
// ============================================================================

/// One built-in binding as declared by the application.
#[derive(Debug, Clone)]
pub struct BindingDefinition {
    pub id: BindingId,
    pub default_keys: KeySpec,
    /// Human-readable action description for the cheat sheet.
    pub description: String,
    pub scope: Scope,
    pub category: Category,
    /// Whether the binding is live before any customization touches it.
    pub enabled_by_default: bool,
    /// Whether the binding fires while focus is in a text-entry control.
    /// Off by default so plain-letter bindings never swallow typing.
    pub allowed_in_text_inputs: bool,
}

impl BindingDefinition {
    /// Declare a binding. `default_keys` must be valid canonical grammar;
    /// the builtin catalog is asserted at construction time, so a typo here
    /// fails fast rather than shipping a dead binding.
    ///
    /// # Panics
    ///
    /// Panics if `default_keys` does not parse.
    pub fn new(id: impl Into<BindingId>, default_keys: &str, description: impl Into<String>) -> Self {
        let id = id.into();
        let default_keys = match KeySpec::parse(default_keys) {
            Ok(spec) => spec,
            Err(error) => panic!("invalid default keys for binding '{id}': {error}"),
        };
        BindingDefinition {
            id,
            default_keys,
            description: description.into(),
            scope: Scope::global(),
            category: Category::Actions,
            enabled_by_default: true,
            allowed_in_text_inputs: false,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Ship the binding dormant; users opt in through customization.
    pub fn disabled_by_default(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    /// Let the binding fire inside text inputs. Only sensible for chords
    /// with a non-shift modifier.
    pub fn allowed_in_text_inputs(mut self) -> Self {
        self.allowed_in_text_inputs = true;
        self
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Errors from assembling a registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate binding id '{0}'")]
    DuplicateId(BindingId),
}

/// All binding definitions in declaration order, with O(1) lookup by id.
#[derive(Debug, Clone)]
pub struct Registry {
    definitions: Vec<BindingDefinition>,
    id_to_index: HashMap<BindingId, usize>,
}

impl Registry {
    pub fn new(definitions: Vec<BindingDefinition>) -> Result<Self, RegistryError> {
        let mut id_to_index = HashMap::with_capacity(definitions.len());
        for (index, def) in definitions.iter().enumerate() {
            if id_to_index.insert(def.id.clone(), index).is_some() {
                return Err(RegistryError::DuplicateId(def.id.clone()));
            }
        }
        Ok(Registry {
            definitions,
            id_to_index,
        })
    }

    /// Definitions in declaration order.
    pub fn all(&self) -> &[BindingDefinition] {
        &self.definitions
    }

    pub fn get(&self, id: &str) -> Option<&BindingDefinition> {
        self.id_to_index.get(id).map(|&index| &self.definitions[index])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_to_index.contains_key(id)
    }

    /// Declaration-order index of a binding id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_to_index.get(id).copied()
    }

    pub fn by_scope<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a BindingDefinition> {
        self.definitions.iter().filter(move |def| &def.scope == scope)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
