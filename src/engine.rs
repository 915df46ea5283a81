//! The keybinding engine: one facade over registry, customization,
//! scopes, interpretation, and dispatch.
//!
//! Hosts own a single `Engine` on their input thread and feed it every key
//! press via [`Engine::key_event`]. The return value says what to do with
//! the event: a dispatch or a pending sequence prefix means "consumed, stop
//! propagation", anything else falls through to normal input handling.
//!
//! Customization edits apply optimistically: the in-memory state and every
//! later key press see the new mapping immediately, while the save runs on
//! a background writer thread. Each edit returns the post-edit conflict
//! list so a settings screen can warn without issuing a second call.
//!
//! # Examples
//!
//! ```
//! use std::time::Instant;
//! use keyscope::builtins::default_registry;
//! use keyscope::config::EngineConfig;
//! use keyscope::engine::{Engine, Handled};
//! use keyscope::keys::{Platform, RawKeyEvent};
//!
//! let mut engine = Engine::new(default_registry(), EngineConfig::with_platform(Platform::Linux));
//! engine.bind_action("palette.open", |_event| { /* open the palette */ });
//!
//! let press = RawKeyEvent { key: "k".into(), ctrl: true, ..Default::default() };
//! match engine.key_event(&press, Instant::now()) {
//!     Handled::Dispatched(id) => assert_eq!(id.as_str(), "palette.open"),
//!     other => panic!("expected dispatch, got {other:?}"),
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::conflict::{detect, Conflict};
use crate::customize::CustomizationSet;
use crate::debug_panic;
use crate::dispatch::{ActionEvent, ActionHandler, Dispatcher};
use crate::interpreter::{Interpreter, KeyOutcome};
use crate::keys::{KeyParseError, KeySpec, Platform, RawKeyEvent};
use crate::registry::{BindingId, Category, Registry};
use crate::resolve::{resolve, ResolvedBinding};
use crate::scope::{Scope, ScopeController, ScopeToken};
use crate::store::{BackgroundWriter, CustomizationStore};

/// What the engine did with one key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// A binding fired. The event is consumed.
    Dispatched(BindingId),
    /// The event started or extended a sequence prefix and is consumed.
    /// The host should arm a timer for `deadline` and call
    /// [`Engine::on_timeout`] when it fires.
    Pending { deadline: Instant },
    /// Nothing matched; let the event propagate normally.
    NotHandled,
}

impl Handled {
    /// Whether the host should swallow the event.
    pub fn is_consumed(&self) -> bool {
        !matches!(self, Handled::NotHandled)
    }
}

/// Cheat sheet grouping: one section per scope, bindings bucketed by
/// category in a fixed category order. Disabled bindings are included so a
/// settings screen can gray them out; pure display callers filter on
/// [`ResolvedBinding::is_enabled`].
#[derive(Debug, Clone)]
pub struct CheatSheetSection {
    pub scope: Scope,
    pub categories: Vec<(Category, Vec<ResolvedBinding>)>,
}

pub struct Engine {
    registry: Registry,
    customizations: CustomizationSet,
    resolved: Vec<ResolvedBinding>,
    scopes: ScopeController,
    interpreter: Interpreter,
    dispatcher: Dispatcher,
    writer: Option<BackgroundWriter>,
    platform: Platform,
}

impl Engine {
    /// Engine with no customizations and no persistence. Edits still apply
    /// in memory; they are simply not written anywhere.
    pub fn new(registry: Registry, config: EngineConfig) -> Self {
        Self::with_customizations(registry, config, CustomizationSet::default())
    }

    /// Engine seeded with an explicit customization set, without a store.
    pub fn with_customizations(
        registry: Registry,
        config: EngineConfig,
        customizations: CustomizationSet,
    ) -> Self {
        let platform = config.platform();
        let resolved = resolve(&registry, &customizations);
        info!(
            event_type = "engine_init",
            bindings = registry.len(),
            customizations = customizations.customizations.len(),
            platform = ?platform,
            "Keybinding engine ready"
        );
        Engine {
            registry,
            customizations,
            resolved,
            scopes: ScopeController::new(),
            interpreter: Interpreter::new(config.sequence_timeout(), platform),
            dispatcher: Dispatcher::new(),
            writer: None,
            platform,
        }
    }

    /// Engine backed by a store: customizations are loaded now and every
    /// edit is persisted through a background writer. A missing or broken
    /// file degrades to defaults with a warning.
    pub fn with_store<S>(registry: Registry, config: EngineConfig, store: S) -> Self
    where
        S: CustomizationStore + Send + 'static,
    {
        let customizations = match store.load() {
            Ok(set) => set,
            Err(error) => {
                warn!(
                    error = %error,
                    "Could not load customizations, starting with defaults"
                );
                CustomizationSet::default()
            }
        };
        let mut engine = Self::with_customizations(registry, config, customizations);
        engine.writer = Some(BackgroundWriter::spawn(store));
        engine
    }

    // ========================================================================
    // Key events
    // ========================================================================

    /// Feed one key press. `now` is the event timestamp; passing it in keeps
    /// the sequence window testable and lets hosts replay buffered input.
    pub fn key_event(&mut self, event: &RawKeyEvent, now: Instant) -> Handled {
        let candidates =
            Self::live_candidates(&self.resolved, &self.scopes, event.in_text_input);

        match self.interpreter.on_key(event, &candidates, now) {
            KeyOutcome::Pending { deadline } => Handled::Pending { deadline },
            KeyOutcome::Pass => Handled::NotHandled,
            KeyOutcome::Dispatch(unit) => {
                let matching: Vec<&ResolvedBinding> = candidates
                    .iter()
                    .copied()
                    .filter(|b| b.effective_keys.matches_input(&unit, self.platform))
                    .collect();

                let Some(selection) = Dispatcher::select(&matching, &self.scopes) else {
                    // The interpreter only dispatches units some candidate
                    // matched, so an empty field here is a logic error.
                    debug_panic!("dispatch unit '{}' matched no candidate", unit.canonical());
                    return Handled::NotHandled;
                };

                let id = selection.winner.id.clone();
                self.dispatcher.dispatch(selection.winner);
                Handled::Dispatched(id)
            }
        }
    }

    /// Expire the pending sequence prefix if its deadline passed. Returns
    /// true when a prefix was discarded. Spurious calls are safe.
    pub fn on_timeout(&mut self, now: Instant) -> bool {
        self.interpreter.on_timeout(now)
    }

    /// Deadline the host should have a timer armed for, if any.
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.interpreter.pending_deadline()
    }

    /// Canonical text of the pending prefix, for "awaiting second key" HUDs.
    pub fn pending_keys(&self) -> Option<String> {
        self.interpreter.pending_canonical()
    }

    fn live_candidates<'a>(
        resolved: &'a [ResolvedBinding],
        scopes: &ScopeController,
        in_text_input: bool,
    ) -> Vec<&'a ResolvedBinding> {
        resolved
            .iter()
            .filter(|b| b.is_enabled)
            .filter(|b| scopes.is_active(&b.scope))
            .filter(|b| !in_text_input || b.allowed_in_text_inputs)
            .collect()
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Mark a UI region mounted. Keep the token and pass it to
    /// [`Engine::leave_scope`] on unmount.
    pub fn enter_scope(&mut self, scope: impl Into<Scope>) -> ScopeToken {
        self.scopes.enter(scope.into())
    }

    /// Release one `enter_scope`. Idempotent per token. A pending sequence
    /// whose bindings just went out of scope is abandoned.
    pub fn leave_scope(&mut self, token: ScopeToken) -> bool {
        let left = self.scopes.leave(token);
        if left {
            self.revalidate_pending();
        }
        left
    }

    pub fn scopes(&self) -> &ScopeController {
        &self.scopes
    }

    /// Pending prefixes started outside text inputs, so revalidation checks
    /// candidates under the non-text-input rules.
    fn revalidate_pending(&mut self) {
        if !self.interpreter.is_pending() {
            return;
        }
        let candidates = Self::live_candidates(&self.resolved, &self.scopes, false);
        self.interpreter.revalidate(&candidates);
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Register the callback for a binding id, replacing any previous one.
    pub fn bind(&self, id: impl Into<BindingId>, handler: ActionHandler) {
        self.dispatcher.bind(id, handler);
    }

    /// [`Engine::bind`] without the `Arc` ceremony.
    pub fn bind_action(
        &self,
        id: impl Into<BindingId>,
        action: impl Fn(&ActionEvent) + Send + Sync + 'static,
    ) {
        self.dispatcher.bind(id, Arc::new(action));
    }

    pub fn unbind(&self, id: &str) -> bool {
        self.dispatcher.unbind(id)
    }

    // ========================================================================
    // Customization edits
    // ========================================================================

    /// Override a binding's keys. The string must parse; rejection leaves
    /// all state untouched. On success the change is live immediately, a
    /// save is queued, and the post-edit conflicts come back for display.
    pub fn set_customization(
        &mut self,
        id: &str,
        keys: &str,
    ) -> Result<Vec<Conflict>, KeyParseError> {
        KeySpec::parse(keys)?;
        if !self.registry.contains(id) {
            warn!(
                event_type = "customize",
                binding_id = id,
                "Customizing unknown binding id, entry will be inert"
            );
        }
        self.customizations.override_keys(id, keys);
        info!(
            event_type = "customize",
            binding_id = id,
            keys = keys,
            "Binding keys overridden"
        );
        Ok(self.after_edit())
    }

    /// Record an explicit "back to default keys" for the binding.
    pub fn reset_keys(&mut self, id: &str) -> Vec<Conflict> {
        self.customizations.clear_keys(id);
        info!(event_type = "customize", binding_id = id, "Binding keys reset to default");
        self.after_edit()
    }

    /// Set (`Some`) or clear (`None`) the per-binding enable override.
    pub fn set_enabled(&mut self, id: &str, enabled: Option<bool>) -> Vec<Conflict> {
        match enabled {
            Some(value) => self.customizations.set_enabled(id, value),
            None => self.customizations.clear_enabled(id),
        }
        info!(
            event_type = "customize",
            binding_id = id,
            enabled = ?enabled,
            "Binding enablement changed"
        );
        self.after_edit()
    }

    /// Drop the whole customization entry for one binding.
    pub fn clear_customization(&mut self, id: &str) -> Vec<Conflict> {
        self.customizations.remove(id);
        info!(event_type = "customize", binding_id = id, "Customization cleared");
        self.after_edit()
    }

    /// Mute or unmute a whole scope.
    pub fn set_scope_disabled(&mut self, scope: impl Into<Scope>, disabled: bool) -> Vec<Conflict> {
        let scope = scope.into();
        self.customizations.set_scope_disabled(scope.clone(), disabled);
        info!(
            event_type = "customize",
            scope = %scope,
            disabled = disabled,
            "Scope enablement changed"
        );
        self.after_edit()
    }

    /// Wipe every customization back to factory defaults.
    pub fn reset_all(&mut self) -> Vec<Conflict> {
        self.customizations.reset();
        info!(event_type = "customize", "All customizations reset");
        self.after_edit()
    }

    fn after_edit(&mut self) -> Vec<Conflict> {
        self.rebuild();
        self.persist();
        self.conflicts()
    }

    fn rebuild(&mut self) {
        self.resolved = resolve(&self.registry, &self.customizations);
        // An edit can retarget or disable the sequence a pending prefix was
        // building toward.
        self.revalidate_pending();
    }

    fn persist(&self) {
        if let Some(writer) = &self.writer {
            writer.submit(self.customizations.clone());
        }
    }

    // ========================================================================
    // Read access
    // ========================================================================

    /// All bindings after customization, in registry order.
    pub fn resolved(&self) -> &[ResolvedBinding] {
        &self.resolved
    }

    pub fn resolved_binding(&self, id: &str) -> Option<&ResolvedBinding> {
        self.resolved.iter().find(|b| b.id.as_str() == id)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn customizations(&self) -> &CustomizationSet {
        &self.customizations
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Current conflicts (duplicates and reserved collisions).
    pub fn conflicts(&self) -> Vec<Conflict> {
        detect(&self.resolved, self.platform)
    }

    /// Render a canonical key string for this engine's platform.
    pub fn format_keys(&self, keys: &str) -> String {
        crate::format::format_keys(keys, self.platform)
    }

    /// Bindings grouped for display: global section first, then regional
    /// scopes in registry first-appearance order.
    pub fn cheat_sheet(&self) -> Vec<CheatSheetSection> {
        let mut scope_order: Vec<Scope> = Vec::new();
        for binding in &self.resolved {
            if !scope_order.contains(&binding.scope) {
                scope_order.push(binding.scope.clone());
            }
        }
        scope_order.sort_by_key(|scope| if scope.is_global() { 0 } else { 1 });

        scope_order
            .into_iter()
            .map(|scope| {
                let categories = Category::ALL
                    .iter()
                    .filter_map(|&category| {
                        let bindings: Vec<ResolvedBinding> = self
                            .resolved
                            .iter()
                            .filter(|b| b.scope == scope && b.category == category)
                            .cloned()
                            .collect();
                        (!bindings.is_empty()).then_some((category, bindings))
                    })
                    .collect();
                CheatSheetSection { scope, categories }
            })
            .collect()
    }
}
