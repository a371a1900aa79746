//! Load/save hooks for the persisted session layout.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use termdeck_core::{PersistedState, Result};

/// Where persisted state lives.
pub trait StateStore {
    /// Load saved state; an absent store yields the empty state.
    fn load(&self) -> Result<PersistedState>;

    /// Replace saved state.
    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// State stored as pretty-printed JSON in one file.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<PersistedState> {
        if !self.path.exists() {
            debug!("No saved state at {}", self.path.display());
            return Ok(PersistedState::default());
        }
        let content = fs::read_to_string(&self.path)?;
        let state: PersistedState = serde_json::from_str(&content)?;
        info!(
            "Loaded saved state: path={}, sessions={}",
            self.path.display(),
            state.sessions.len()
        );
        Ok(state)
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Staged write, renamed over the target.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(state)?)?;
        fs::rename(&staging, &self.path)?;
        info!(
            "Saved state: path={}, sessions={}",
            self.path.display(),
            state.sessions.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termdeck_core::{PersistedSession, SessionId};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("termdeck-{}-{}", std::process::id(), name))
            .join("state.json")
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let store = JsonStateStore::new(scratch("missing"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch("roundtrip");
        let store = JsonStateStore::new(&path);
        let state = PersistedState {
            sessions: vec![PersistedSession {
                id: SessionId::from("a"),
                name: "Terminal 1".to_string(),
                slot: 2,
            }],
            active_id: Some(SessionId::from("a")),
            order: vec![SessionId::from("a")],
        };

        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"activeId\""));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let path = scratch("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        let store = JsonStateStore::new(&path);
        assert!(store.load().is_err());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
