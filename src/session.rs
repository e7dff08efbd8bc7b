//! Persistent session token storage
//!
//! The auth token survives process restarts in a small JSON file in the
//! config directory, so operators are not forced back through login every
//! time the dashboard comes up.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, error, warn};

use crate::config::get_config_file_path;

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Serialize, Deserialize)]
struct SavedSession {
    token: String,
}

/// File-backed store for the session token.
///
/// All operations are best-effort: a broken or missing file degrades to
/// "no session" and the next login rewrites it.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            path: get_config_file_path(SESSION_FILE),
        }
    }

    /// Store rooted in an explicit directory instead of the platform
    /// config dir. Used by tests.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join(SESSION_FILE),
        }
    }

    pub fn save(&self, token: &str) {
        let saved = SavedSession {
            token: token.to_string(),
        };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("Failed to create config directory: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(&saved) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    error!("Failed to save session to {:?}: {}", self.path, e);
                } else {
                    debug!("Saved session to {:?}", self.path);
                }
            }
            Err(e) => error!("Failed to serialize session: {}", e),
        }
    }

    pub fn load(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<SavedSession>(&contents) {
            Ok(saved) => {
                debug!("Loaded session from {:?}", self.path);
                Some(saved.token)
            }
            Err(e) => {
                warn!("Failed to parse session file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Remove the saved token. Safe to call when no file exists.
    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Cleared session at {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clear session at {:?}: {}", self.path, e),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_dir(dir.path());

        assert_eq!(store.load(), None);
        store.save("tok-123");
        assert_eq!(store.load(), Some("tok-123".to_string()));

        // Overwrite replaces the previous token.
        store.save("tok-456");
        assert_eq!(store.load(), Some("tok-456".to_string()));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_dir(dir.path());

        store.clear();
        store.save("tok-123");
        store.clear();
        assert_eq!(store.load(), None);
        store.clear();
    }

    #[test]
    fn test_corrupt_file_loads_as_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_dir(dir.path());

        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_missing_directory_loads_as_no_session() {
        let store = SessionStore::with_dir("/nonexistent/path/for/tests");
        assert_eq!(store.load(), None);
    }
}
