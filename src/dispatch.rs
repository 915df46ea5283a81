//! Dispatch: choosing the winning binding and running its callback.
//!
//! Callbacks are plain closures keyed by binding id. Registration goes
//! through a mutex so UI regions can bind and unbind during mount/unmount
//! while the engine is owned elsewhere; the lock is never held across a
//! callback invocation.
//!
//! When several candidate bindings match the same completed input, the
//! winner is picked deterministically:
//! 1. a binding from an active non-global scope beats a global binding,
//! 2. among non-global scopes, the most recently entered scope wins,
//! 3. remaining ties fall back to registration order.
//!
//! A tie inside one scope means two live bindings in the same region share
//! keys. That is a setup smell rather than an input ambiguity, so it is
//! logged and reported while the first-registered binding still runs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::registry::BindingId;
use crate::resolve::ResolvedBinding;
use crate::scope::{Scope, ScopeController};

/// Callback invoked when a binding fires.
pub type ActionHandler = Arc<dyn Fn(&ActionEvent) + Send + Sync>;

/// What a callback learns about the press that triggered it.
#[derive(Debug, Clone)]
pub struct ActionEvent {
    pub binding_id: BindingId,
    /// Canonical effective keys of the winning binding.
    pub keys: String,
    pub scope: Scope,
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    Invoked,
    /// The binding matched but nothing is bound to it right now.
    NoHandler,
    /// The callback panicked; the panic was contained.
    HandlerPanicked,
}

/// The winning binding plus any same-scope ties that lost to it.
pub struct Selection<'a> {
    pub winner: &'a ResolvedBinding,
    pub shadowed: Vec<BindingId>,
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: Mutex<HashMap<BindingId, ActionHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback for a binding id, replacing any previous one.
    pub fn bind(&self, id: impl Into<BindingId>, handler: ActionHandler) {
        let id = id.into();
        debug!(event_type = "handler_bind", binding_id = %id, "Handler bound");
        self.handlers.lock().insert(id, handler);
    }

    pub fn unbind(&self, id: &str) -> bool {
        let removed = self.handlers.lock().remove(id).is_some();
        if removed {
            debug!(event_type = "handler_unbind", binding_id = id, "Handler unbound");
        }
        removed
    }

    pub fn is_bound(&self, id: &str) -> bool {
        self.handlers.lock().contains_key(id)
    }

    /// Pick the winner among candidates that matched the same input.
    /// `candidates` must be in registration order; returns `None` only for
    /// an empty slice.
    pub fn select<'a>(
        candidates: &[&'a ResolvedBinding],
        scopes: &ScopeController,
    ) -> Option<Selection<'a>> {
        // (global flag, recency rank); min wins, first-minimal keeps
        // registration order as the final tie-break.
        let rank = |binding: &ResolvedBinding| -> (u8, usize) {
            if binding.scope.is_global() {
                (1, usize::MAX)
            } else {
                (
                    0,
                    scopes.recency_rank(&binding.scope).unwrap_or(usize::MAX),
                )
            }
        };

        let winner = *candidates.iter().min_by_key(|b| rank(b))?;

        let shadowed: Vec<BindingId> = candidates
            .iter()
            .filter(|b| b.scope == winner.scope && b.id != winner.id)
            .map(|b| b.id.clone())
            .collect();

        if !shadowed.is_empty() {
            warn!(
                event_type = "dispatch_conflict",
                binding_id = %winner.id,
                scope = %winner.scope,
                keys = %winner.effective_keys_text(),
                shadowed = ?shadowed.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
                "Multiple live bindings in one scope share these keys"
            );
        }

        Some(Selection { winner, shadowed })
    }

    /// Run the callback for `binding`. Panics in the callback are contained
    /// and logged so one misbehaving action cannot wedge the keyboard.
    pub fn dispatch(&self, binding: &ResolvedBinding) -> DispatchResult {
        let event = ActionEvent {
            binding_id: binding.id.clone(),
            keys: binding.effective_keys_text(),
            scope: binding.scope.clone(),
        };

        let handler = {
            let handlers = self.handlers.lock();
            handlers.get(binding.id.as_str()).cloned()
        };

        let Some(handler) = handler else {
            debug!(
                event_type = "dispatch",
                binding_id = %binding.id,
                keys = %event.keys,
                "Binding fired with no handler bound"
            );
            return DispatchResult::NoHandler;
        };

        debug!(
            event_type = "dispatch",
            binding_id = %binding.id,
            keys = %event.keys,
            scope = %event.scope,
            "Dispatching binding"
        );

        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(&event)));
        match outcome {
            Ok(()) => DispatchResult::Invoked,
            Err(_) => {
                error!(
                    event_type = "dispatch_panic",
                    binding_id = %binding.id,
                    "Action callback panicked"
                );
                DispatchResult::HandlerPanicked
            }
        }
    }
}
