//! JSON-file state store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use riftward_core::error::StoreError;
use riftward_core::state::GameState;
use riftward_core::store::StateStore;
use tracing::{debug, info};

/// Keeps the game state in a single JSON file. A missing file reads as a
/// fresh session; writes go to a sibling temp file that is renamed over the
/// original.
///
/// When no file existed at open, persisting the fresh session again removes
/// the file instead, so a rolled-back first turn leaves nothing behind.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
    started_absent: bool,
}

impl JsonFileStateStore {
    /// Opens the store at `path`, noting whether a saved state exists yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let started_absent = !path.exists();
        Self {
            path,
            started_absent,
        }
    }

    /// Location of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "fresh session restored, state file removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError(format!("{}: {err}", self.path.display()))),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStateStore {
    fn snapshot(&self) -> Result<GameState, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| StoreError(format!("{}: {e}", self.path.display()))),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no saved state, starting a new session");
                Ok(GameState::new_session())
            }
            Err(err) => Err(StoreError(format!("{}: {err}", self.path.display()))),
        }
    }

    fn persist(&self, state: &GameState) -> Result<(), StoreError> {
        if self.started_absent && *state == GameState::new_session() {
            return self.remove();
        }
        let raw = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError(format!("state serialization failed: {e}")))?;
        let temp = self.temp_path();
        fs::write(&temp, raw).map_err(|e| StoreError(format!("{}: {e}", temp.display())))?;
        fs::rename(&temp, &self.path)
            .map_err(|e| StoreError(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), turn = state.turn, "state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("riftward-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn test_missing_file_reads_as_new_session() {
        let store = JsonFileStateStore::new(scratch("missing.json"));

        assert_eq!(store.snapshot().unwrap(), GameState::new_session());
    }

    #[test]
    fn test_persisted_state_is_read_back() {
        let store = JsonFileStateStore::new(scratch("saved.json"));
        let mut state = GameState::new_session();
        state.turn = 4;
        state.flags.insert("bridge_burned".to_owned());

        store.persist(&state).unwrap();

        assert_eq!(store.snapshot().unwrap(), state);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_restoring_fresh_session_leaves_no_file() {
        let path = scratch("restored.json");
        let store = JsonFileStateStore::new(&path);
        let before = store.snapshot().unwrap();
        let mut during = before.clone();
        during.flags.insert("gate_open".to_owned());

        store.persist(&during).unwrap();
        assert!(path.exists());
        store.persist(&before).unwrap();

        assert!(!path.exists());
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn test_existing_file_is_always_written() {
        let path = scratch("existing.json");
        let fresh = GameState::new_session();
        fs::write(&path, serde_json::to_string(&fresh).unwrap()).unwrap();
        let store = JsonFileStateStore::new(&path);

        store.persist(&fresh).unwrap();

        assert!(path.exists());
        assert_eq!(store.snapshot().unwrap(), fresh);
    }

    #[test]
    fn test_corrupt_file_is_a_store_error() {
        let path = scratch("corrupt.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStateStore::new(&path).snapshot().unwrap_err();

        assert!(err.0.contains("corrupt.json"));
    }
}
