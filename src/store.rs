//! Customization persistence.
//!
//! [`CustomizationStore`] abstracts where the customization file lives so
//! the engine can be tested against an in-memory store. The production
//! implementation, [`JsonFileStore`], keeps a pretty-printed JSON file under
//! the user config directory and writes it atomically (temp file + rename)
//! so a crash mid-save cannot truncate existing customizations.
//!
//! Saves are fire-and-forget from the engine's point of view: edits apply
//! to the in-memory state immediately and a snapshot goes to a
//! [`BackgroundWriter`] thread. Write failures are logged, never surfaced
//! to the keystroke path. Dropping the writer closes its queue and joins
//! the thread, flushing whatever is still pending.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use async_channel::TrySendError;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::customize::CustomizationSet;
use crate::error::ResultExt;

/// Errors from loading or saving the customization file.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid customization file: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize customizations: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where customizations are loaded from and saved to.
pub trait CustomizationStore {
    fn load(&self) -> Result<CustomizationSet, StoreError>;
    fn save(&self, set: &CustomizationSet) -> Result<(), StoreError>;
}

// ============================================================================
// JsonFileStore
// ============================================================================

/// JSON file store with atomic writes.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    /// `<config dir>/keyscope/customizations.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("keyscope")
            .join("customizations.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CustomizationStore for JsonFileStore {
    fn load(&self) -> Result<CustomizationSet, StoreError> {
        if !self.path.exists() {
            info!(
                path = %self.path.display(),
                "No customization file found, starting with defaults"
            );
            return Ok(CustomizationSet::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        let set: CustomizationSet =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        info!(
            path = %self.path.display(),
            entries = set.customizations.len(),
            disabled_scopes = set.disabled_scopes.len(),
            "Loaded customizations"
        );
        Ok(set)
    }

    #[instrument(name = "customizations_save", skip(self, set))]
    fn save(&self, set: &CustomizationSet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut stamped = set.clone();
        stamped.saved_at = Some(chrono::Utc::now());
        let json = serde_json::to_string_pretty(&stamped)?;

        // Write to a temp file then rename for atomicity.
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &json).map_err(|source| StoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        info!(
            path = %self.path.display(),
            bytes = json.len(),
            entries = stamped.customizations.len(),
            "Saved customizations"
        );
        Ok(())
    }
}

// ============================================================================
// BackgroundWriter
// ============================================================================

/// Dedicated thread that drains customization snapshots and saves them.
pub struct BackgroundWriter {
    tx: async_channel::Sender<CustomizationSet>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWriter {
    /// Spawn the writer thread. Bounded queue so a stuck disk cannot grow
    /// memory without limit.
    pub fn spawn<S>(store: S) -> Self
    where
        S: CustomizationStore + Send + 'static,
    {
        let (tx, rx) = async_channel::bounded::<CustomizationSet>(16);

        let handle = std::thread::spawn(move || {
            debug!("Customization writer thread started");
            while let Ok(mut set) = rx.recv_blocking() {
                // Burst edits coalesce: only the newest snapshot matters.
                while let Ok(newer) = rx.try_recv() {
                    set = newer;
                }
                store.save(&set).log_err();
            }
            debug!("Customization writer thread exiting");
        });

        BackgroundWriter {
            tx,
            handle: Some(handle),
        }
    }

    /// Queue a snapshot for saving. Never blocks the caller; if the queue is
    /// somehow full the snapshot is dropped with a warning (a later edit
    /// will carry the same state forward).
    pub fn submit(&self, set: CustomizationSet) {
        match self.tx.try_send(set) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    event_type = "customization_save",
                    "Writer queue full, dropping snapshot"
                );
            }
            Err(TrySendError::Closed(_)) => {
                error!(
                    event_type = "customization_save",
                    "Writer thread is gone, customization not persisted"
                );
            }
        }
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain remaining snapshots and
        // exit; joining makes shutdown flush deterministic.
        self.tx.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Customization writer thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("customizations.json"));
        let set = store.load().unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("customizations.json"));

        let mut set = CustomizationSet::default();
        set.override_keys("palette.open", "mod+p");
        set.set_enabled("list.next", false);
        set.set_scope_disabled(crate::scope::Scope::new("form"), true);

        store.save(&set).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(
            loaded.get("palette.open").unwrap().keys_override(),
            Some("mod+p")
        );
        assert_eq!(loaded.get("list.next").unwrap().enabled, Some(false));
        assert!(loaded.is_scope_disabled(&crate::scope::Scope::new("form")));
        assert!(loaded.saved_at.is_some(), "save stamps savedAt");
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("deep").join("c.json"));
        store.save(&CustomizationSet::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("customizations.json");
        let store = JsonFileStore::new(&path);
        store.save(&CustomizationSet::default()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("customizations.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn background_writer_flushes_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("customizations.json");

        let writer = BackgroundWriter::spawn(JsonFileStore::new(&path));
        let mut set = CustomizationSet::default();
        set.override_keys("palette.open", "mod+p");
        writer.submit(set);
        drop(writer);

        let loaded = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(
            loaded.get("palette.open").unwrap().keys_override(),
            Some("mod+p")
        );
    }

    #[test]
    fn background_writer_survives_store_failures() {
        struct FailingStore;
        impl CustomizationStore for FailingStore {
            fn load(&self) -> Result<CustomizationSet, StoreError> {
                Ok(CustomizationSet::default())
            }
            fn save(&self, _set: &CustomizationSet) -> Result<(), StoreError> {
                Err(StoreError::Write {
                    path: PathBuf::from("/nope"),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                })
            }
        }

        let writer = BackgroundWriter::spawn(FailingStore);
        writer.submit(CustomizationSet::default());
        writer.submit(CustomizationSet::default());
        drop(writer); // must not panic
    }
}
