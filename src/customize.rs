//! User customizations: the persisted layer on top of binding definitions.
//!
//! A [`CustomizationSet`] is what the customization file holds. It is keyed
//! by binding id and deliberately sparse: only deltas from the defaults are
//! recorded, so application updates flow through untouched bindings.
//!
//! Forward compatibility rules:
//! - `schemaVersion` is written on save. Newer-versioned files are applied
//!   best-effort rather than rejected.
//! - Entries for binding ids the running version does not know are kept
//!   intact and written back on save, so downgrades do not destroy data.
//! - For the `keys` field, absent and `null` mean different things: absent
//!   keeps the default keys, `null` records "explicitly cleared" (which also
//!   resolves to the default keys today, but round-trips as `null`).
//!
//! # Examples
//!
//! ```
//! use keyscope::customize::CustomizationSet;
//!
//! let mut set = CustomizationSet::default();
//! set.override_keys("palette.open", "mod+p");
//! set.set_enabled("list.next", false);
//! assert!(set.get("palette.open").is_some());
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::registry::BindingId;
use crate::scope::Scope;

/// Version written into every saved customization file.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Deserialize `Option<Option<T>>` so that JSON `null` becomes `Some(None)`
/// while an absent field stays `None` (via `#[serde(default)]`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// ============================================================================
// Customization
// ============================================================================

/// Per-binding delta. Every field is optional; an empty delta is pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    /// Replacement keys in canonical grammar. `None` = field absent (keep
    /// default), `Some(None)` = explicitly cleared back to default.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub keys: Option<Option<String>>,

    /// Per-binding enable override. Absent defers to the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Customization {
    /// Whether this delta still changes anything worth persisting.
    pub fn is_noop(&self) -> bool {
        self.keys.is_none() && self.enabled.is_none()
    }

    /// The replacement key string, if one is set (not absent, not cleared).
    pub fn keys_override(&self) -> Option<&str> {
        match &self.keys {
            Some(Some(keys)) => Some(keys.as_str()),
            _ => None,
        }
    }
}

// ============================================================================
// CustomizationSet
// ============================================================================

/// Everything the customization file holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationSet {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub customizations: HashMap<BindingId, Customization>,

    /// Scopes the user muted wholesale.
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub disabled_scopes: HashSet<Scope>,

    /// Stamped by the store on save. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for CustomizationSet {
    fn default() -> Self {
        CustomizationSet {
            schema_version: SCHEMA_VERSION,
            customizations: HashMap::new(),
            disabled_scopes: HashSet::new(),
            saved_at: None,
        }
    }
}

impl CustomizationSet {
    /// Record replacement keys for a binding. The string is stored as given;
    /// validation happens at the editing boundary and again, defensively, at
    /// resolution.
    pub fn override_keys(&mut self, id: impl Into<BindingId>, keys: impl Into<String>) {
        self.customizations
            .entry(id.into())
            .or_default()
            .keys = Some(Some(keys.into()));
    }

    /// Record an explicit "back to default keys" (`null` in the file).
    pub fn clear_keys(&mut self, id: impl Into<BindingId>) {
        self.customizations.entry(id.into()).or_default().keys = Some(None);
    }

    /// Set or clear the per-binding enable override.
    pub fn set_enabled(&mut self, id: impl Into<BindingId>, enabled: bool) {
        self.customizations.entry(id.into()).or_default().enabled = Some(enabled);
    }

    pub fn clear_enabled(&mut self, id: &str) {
        if let Some(entry) = self.customizations.get_mut(id) {
            entry.enabled = None;
            if entry.is_noop() {
                self.customizations.remove(id);
            }
        }
    }

    /// Drop the whole delta for one binding.
    pub fn remove(&mut self, id: &str) {
        self.customizations.remove(id);
    }

    pub fn set_scope_disabled(&mut self, scope: Scope, disabled: bool) {
        if disabled {
            self.disabled_scopes.insert(scope);
        } else {
            self.disabled_scopes.remove(&scope);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Customization> {
        self.customizations.get(id)
    }

    pub fn is_scope_disabled(&self, scope: &Scope) -> bool {
        self.disabled_scopes.contains(scope)
    }

    /// True when nothing deviates from the defaults.
    pub fn is_empty(&self) -> bool {
        self.customizations.is_empty() && self.disabled_scopes.is_empty()
    }

    /// Wipe all customizations, keeping the schema version.
    pub fn reset(&mut self) {
        self.customizations.clear();
        self.disabled_scopes.clear();
    }
}
