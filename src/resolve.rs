//! Resolution: merging definitions with user customizations.
//!
//! [`resolve`] is a pure function from a [`Registry`] and a
//! [`CustomizationSet`] to the list of [`ResolvedBinding`]s the rest of the
//! engine consumes. It never fails; malformed customization data degrades to
//! the definition defaults with a diagnostic, because a typo in a config file
//! must not cost the user their keyboard.

use tracing::{debug, warn};

use crate::customize::{CustomizationSet, SCHEMA_VERSION};
use crate::keys::KeySpec;
use crate::registry::{BindingId, Category, Registry};
use crate::scope::Scope;

/// One binding after customization has been applied. This is what dispatch
/// matches against and what the cheat sheet displays.
#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    pub id: BindingId,
    pub description: String,
    pub scope: Scope,
    pub category: Category,
    pub allowed_in_text_inputs: bool,
    pub default_keys: KeySpec,
    /// The keys that actually fire: the user override when present and
    /// valid, otherwise the defaults.
    pub effective_keys: KeySpec,
    /// Net enablement: per-binding override, else the definition default,
    /// and always false while the owning scope is muted.
    pub is_enabled: bool,
    /// Whether `effective_keys` came from a user override.
    pub is_customized: bool,
}

impl ResolvedBinding {
    pub fn effective_keys_text(&self) -> String {
        self.effective_keys.canonical()
    }
}

/// Merge `customizations` over `registry`. Output preserves registry order.
///
/// Tolerance rules:
/// - Entries for unknown binding ids are skipped (and logged at DEBUG); they
///   stay in the set for forward compatibility but have no effect here.
/// - An override whose key string fails to parse falls back to the default
///   keys and logs a warning.
/// - A newer `schemaVersion` is applied best-effort with a warning.
pub fn resolve(registry: &Registry, customizations: &CustomizationSet) -> Vec<ResolvedBinding> {
    if customizations.schema_version > SCHEMA_VERSION {
        warn!(
            event_type = "customization_schema",
            file_version = customizations.schema_version,
            supported_version = SCHEMA_VERSION,
            "Customization file is from a newer version, applying best-effort"
        );
    }

    for id in customizations.customizations.keys() {
        if !registry.contains(id.as_str()) {
            debug!(
                event_type = "customization_unknown_id",
                binding_id = %id,
                "Ignoring customization for unknown binding"
            );
        }
    }

    registry
        .all()
        .iter()
        .map(|def| {
            let delta = customizations.get(def.id.as_str());

            let (effective_keys, is_customized) = match delta.and_then(|d| d.keys_override()) {
                Some(raw) => match KeySpec::parse(raw) {
                    Ok(spec) => (spec, true),
                    Err(error) => {
                        warn!(
                            event_type = "customization_invalid_keys",
                            binding_id = %def.id,
                            keys = raw,
                            error = %error,
                            "Ignoring invalid key override, using default keys"
                        );
                        (def.default_keys.clone(), false)
                    }
                },
                None => (def.default_keys.clone(), false),
            };

            let enabled_override = delta.and_then(|d| d.enabled);
            let is_enabled = enabled_override.unwrap_or(def.enabled_by_default)
                && !customizations.is_scope_disabled(&def.scope);

            ResolvedBinding {
                id: def.id.clone(),
                description: def.description.clone(),
                scope: def.scope.clone(),
                category: def.category,
                allowed_in_text_inputs: def.allowed_in_text_inputs,
                default_keys: def.default_keys.clone(),
                effective_keys,
                is_enabled,
                is_customized,
            }
        })
        .collect()
}
