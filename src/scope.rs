//! Scope activation tracking.
//!
//! A scope is a named UI region (`"search"`, `"dialog"`) whose bindings only
//! fire while some part of that region is mounted. Regions enter their scope
//! on mount and leave on unmount; because several instances of a region can
//! be mounted at once, activation is refcounted. The special `global` scope
//! is always active and is not tracked by the counter.
//!
//! [`ScopeController::enter`] returns an opaque [`ScopeToken`]. Releasing the
//! token through [`ScopeController::leave`] is idempotent: tearing down a UI
//! region twice must not underflow some other region's count.
//!
//! The controller also remembers entry recency. When bindings from several
//! active scopes match the same keys, dispatch favors the scope entered most
//! recently (the innermost UI region).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::debug_panic;

const GLOBAL_SCOPE: &str = "global";

// ============================================================================
// Scope
// ============================================================================

/// Scope identifier. Compares and hashes as its string name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Scope(name.into())
    }

    /// The always-active scope.
    pub fn global() -> Self {
        Scope(GLOBAL_SCOPE.to_string())
    }

    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_SCOPE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Scope::new(name)
    }
}

impl std::borrow::Borrow<str> for Scope {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ScopeToken
// ============================================================================

/// Opaque receipt for one [`ScopeController::enter`] call. Pass it back to
/// [`ScopeController::leave`] exactly once; extra releases are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeToken {
    id: u64,
}

// ============================================================================
// ScopeController
// ============================================================================

/// Refcounted scope activation with entry recency.
pub struct ScopeController {
    /// Live refcount per non-global scope. Absent means inactive.
    counts: HashMap<Scope, usize>,
    /// Active non-global scopes, most recently entered first.
    recency: Vec<Scope>,
    /// Tokens that have not been released yet, mapped to their scope.
    live_tokens: HashMap<u64, Scope>,
    next_token: u64,
}

impl ScopeController {
    pub fn new() -> Self {
        ScopeController {
            counts: HashMap::new(),
            recency: Vec::new(),
            live_tokens: HashMap::new(),
            next_token: 0,
        }
    }

    /// Activate `scope` (or bump its refcount) and return the release token.
    ///
    /// Re-entering an already-active scope refreshes its recency: a region
    /// the user just moved into counts as innermost again. Entering `global`
    /// hands back an inert token since global is active unconditionally.
    pub fn enter(&mut self, scope: Scope) -> ScopeToken {
        let token = ScopeToken { id: self.next_token };
        self.next_token += 1;

        if scope.is_global() {
            debug!(event_type = "scope_enter", scope = %scope, "Global scope is always active");
            return token;
        }

        let count = self.counts.entry(scope.clone()).or_insert(0);
        *count += 1;
        let count = *count;

        self.recency.retain(|s| s != &scope);
        self.recency.insert(0, scope.clone());
        self.live_tokens.insert(token.id, scope.clone());

        debug!(
            event_type = "scope_enter",
            scope = %scope,
            refcount = count,
            "Scope entered"
        );
        token
    }

    /// Release one `enter`. Returns true if the token was live; releasing an
    /// already-released (or global) token returns false and changes nothing.
    pub fn leave(&mut self, token: ScopeToken) -> bool {
        let Some(scope) = self.live_tokens.remove(&token.id) else {
            debug!(event_type = "scope_leave", "Ignoring already-released scope token");
            return false;
        };

        match self.counts.get_mut(&scope) {
            Some(count) if *count > 1 => {
                *count -= 1;
                debug!(
                    event_type = "scope_leave",
                    scope = %scope,
                    refcount = *count,
                    "Scope refcount decremented"
                );
            }
            Some(_) => {
                self.counts.remove(&scope);
                self.recency.retain(|s| s != &scope);
                debug!(event_type = "scope_leave", scope = %scope, "Scope deactivated");
            }
            None => {
                debug_panic!("live token for scope '{scope}' without a refcount");
            }
        }
        true
    }

    /// Whether bindings in `scope` may currently fire.
    pub fn is_active(&self, scope: &Scope) -> bool {
        scope.is_global() || self.counts.contains_key(scope)
    }

    /// Active non-global scopes, most recently entered first.
    pub fn active_scopes(&self) -> &[Scope] {
        &self.recency
    }

    /// Position in the recency order (0 = most recent). `None` for inactive
    /// or global scopes.
    pub fn recency_rank(&self, scope: &Scope) -> Option<usize> {
        self.recency.iter().position(|s| s == scope)
    }

    /// Current refcount, 0 when inactive.
    pub fn depth(&self, scope: &Scope) -> usize {
        self.counts.get(scope).copied().unwrap_or(0)
    }
}

impl Default for ScopeController {
    fn default() -> Self {
        Self::new()
    }
}
