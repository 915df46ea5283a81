//! Conflict detection over resolved bindings.
//!
//! Two enabled bindings conflict when their effective keys land on the same
//! physical chords (after `mod` resolution) and their scopes can be active
//! at the same time: identical scopes, or either side global. Bindings in
//! two different non-global scopes never conflict here; if both regions do
//! end up mounted at once, dispatch settles it by scope recency.
//!
//! Detection also checks effective keys against a table of shortcuts the
//! host environment (browser or OS) swallows before the page sees them.
//! Those entries are advisory: the engine cannot intercept `mod+w`, only
//! warn the user that their customization will never fire.
//!
//! Detection is pure and runs on demand: after customization edits, on
//! settings-screen render, and from the `conflicts` CLI subcommand.

use std::collections::HashMap;

use serde::Serialize;

use crate::keys::{Chord, KeySpec, Platform};
use crate::registry::BindingId;
use crate::resolve::ResolvedBinding;
use crate::scope::Scope;

// ============================================================================
// Reserved shortcuts
// ============================================================================

/// Chords the host environment claims before the application sees them.
/// Canonical grammar on the left, human label on the right.
pub fn reserved_shortcuts(platform: Platform) -> &'static [(&'static str, &'static str)] {
    match platform {
        Platform::MacOs => &[
            ("mod+q", "Quit application"),
            ("mod+w", "Close tab"),
            ("mod+shift+w", "Close window"),
            ("mod+t", "New tab"),
            ("mod+shift+t", "Reopen closed tab"),
            ("mod+n", "New window"),
            ("mod+shift+n", "New incognito window"),
            ("mod+m", "Minimize window"),
            ("mod+tab", "Application switcher"),
            ("ctrl+tab", "Next tab"),
            ("ctrl+shift+tab", "Previous tab"),
            ("mod+space", "Spotlight"),
        ],
        Platform::Windows | Platform::Linux => &[
            ("mod+w", "Close tab"),
            ("mod+shift+w", "Close window"),
            ("mod+t", "New tab"),
            ("mod+shift+t", "Reopen closed tab"),
            ("mod+n", "New window"),
            ("mod+shift+n", "New incognito window"),
            ("alt+tab", "Window switcher"),
            ("alt+f4", "Close window"),
            ("ctrl+tab", "Next tab"),
            ("ctrl+shift+tab", "Previous tab"),
            ("f11", "Toggle fullscreen"),
        ],
    }
}

// ============================================================================
// Conflicts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    /// Two enabled bindings share effective keys in co-activatable scopes.
    DuplicateKeys,
    /// Effective keys collide with a host-reserved shortcut.
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Canonical keys the parties share.
    pub keys: String,
    /// Owning scopes of the bindings involved.
    pub scopes: Vec<Scope>,
    pub binding_ids: Vec<BindingId>,
    /// Human label of the reserved shortcut, for `Reserved` conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_label: Option<String>,
}

fn scopes_can_coexist(a: &Scope, b: &Scope) -> bool {
    a == b || a.is_global() || b.is_global()
}

/// Find all conflicts among `resolved`. Disabled bindings are exempt: their
/// keys cannot fire, so they cannot collide.
pub fn detect(resolved: &[ResolvedBinding], platform: Platform) -> Vec<Conflict> {
    let enabled: Vec<&ResolvedBinding> = resolved.iter().filter(|b| b.is_enabled).collect();
    let mut conflicts = Vec::new();

    // Group by resolved canonical form so `mod+k` and `meta+k` collide on
    // macOS, where they are the same physical chord.
    let mut by_keys: HashMap<String, Vec<&ResolvedBinding>> = HashMap::new();
    for binding in &enabled {
        by_keys
            .entry(binding.effective_keys.resolved_canonical(platform))
            .or_default()
            .push(binding);
    }

    let mut groups: Vec<(String, Vec<&ResolvedBinding>)> = by_keys.into_iter().collect();
    groups.sort_by(|a, b| a.0.cmp(&b.0));

    for (_, group) in groups {
        for (i, a) in group.iter().enumerate() {
            for b in &group[i + 1..] {
                if scopes_can_coexist(&a.scope, &b.scope) {
                    conflicts.push(Conflict {
                        kind: ConflictKind::DuplicateKeys,
                        keys: a.effective_keys_text(),
                        scopes: vec![a.scope.clone(), b.scope.clone()],
                        binding_ids: vec![a.id.clone(), b.id.clone()],
                        reserved_label: None,
                    });
                }
            }
        }
    }

    // Reserved table: a chord that equals a reserved entry can never reach
    // the application. A sequence whose first hop is reserved is just as
    // dead, the prefix key never arrives.
    let reserved: Vec<(Chord, &str)> = reserved_shortcuts(platform)
        .iter()
        .filter_map(|(keys, label)| match Chord::parse(keys) {
            Ok(chord) => Some((chord, *label)),
            Err(_) => None,
        })
        .collect();

    for binding in &enabled {
        let probe = match &binding.effective_keys {
            KeySpec::Chord(chord) => chord,
            KeySpec::Sequence(hops) => &hops[0],
        };
        for (chord, label) in &reserved {
            if probe.same_effective(chord, platform) {
                conflicts.push(Conflict {
                    kind: ConflictKind::Reserved,
                    keys: binding.effective_keys_text(),
                    scopes: vec![binding.scope.clone()],
                    binding_ids: vec![binding.id.clone()],
                    reserved_label: Some((*label).to_string()),
                });
            }
        }
    }

    conflicts
}
