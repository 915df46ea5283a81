//! Engine configuration.
//!
//! Small on purpose: the timing window for sequences and an optional
//! platform pin. Hosts embed this in their own settings file; every field
//! has a serde default so partial configs deserialize cleanly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::keys::Platform;

/// Default sequence window. Long enough for deliberate two-key navigation,
/// short enough that an abandoned prefix clears before it surprises anyone.
pub const DEFAULT_SEQUENCE_TIMEOUT_MS: u64 = 1000;

fn default_sequence_timeout_ms() -> u64 {
    DEFAULT_SEQUENCE_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// How long a sequence prefix stays live waiting for the next chord.
    #[serde(default = "default_sequence_timeout_ms")]
    pub sequence_timeout_ms: u64,

    /// Pin the platform instead of detecting it. Used by tests and by the
    /// CLI `--platform` flag; `None` means the build target decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sequence_timeout_ms: DEFAULT_SEQUENCE_TIMEOUT_MS,
            platform: None,
        }
    }
}

impl EngineConfig {
    pub fn sequence_timeout(&self) -> Duration {
        Duration::from_millis(self.sequence_timeout_ms)
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }

    /// Convenience for tests and embedded hosts.
    pub fn with_platform(platform: Platform) -> Self {
        EngineConfig {
            platform: Some(platform),
            ..Default::default()
        }
    }
}
