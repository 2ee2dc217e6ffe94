// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`SessionMap`] — persisted `(bindingId, chatKey) → sessionId` mapping so
//! repeated messages from the same chat (or channel, or binding, per
//! strategy) reuse the same agent session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::warn;

use crate::error::RouterError;
use crate::generation::GenerationGuard;

const FILE_NAME: &str = "session-map.json";

fn load_from_disk(dir: &Path) -> HashMap<String, String> {
    let path = dir.join(FILE_NAME);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(_) => return HashMap::new(),
    };
    match serde_json::from_str::<Vec<(String, String)>>(&raw) {
        Ok(tuples) => tuples.into_iter().collect(),
        Err(e) => {
            warn!(target: "relay.router", path = %path.display(), error = %e, "malformed session-map.json, treating as empty");
            HashMap::new()
        }
    }
}

fn save_to_disk(dir: &Path, entries: &HashMap<String, String>) -> Result<(), RouterError> {
    let path = dir.join(FILE_NAME);
    let tmp = dir.join(format!("{FILE_NAME}.tmp"));
    let tuples: Vec<(&String, &String)> = entries.iter().collect();
    let body = serde_json::to_string_pretty(&tuples).map_err(|e| RouterError::Io(e.to_string()))?;
    std::fs::write(&tmp, body).map_err(|e| RouterError::Io(e.to_string()))?;
    std::fs::rename(&tmp, &path).map_err(|e| RouterError::Io(e.to_string()))?;
    Ok(())
}

/// Composite key identifying a session slot: a binding plus the
/// strategy-specific discriminant (chat id, channel type, or nothing for
/// a shared binding).
#[must_use]
pub fn session_key(binding_id: &str, discriminant: &str) -> String {
    if discriminant.is_empty() {
        binding_id.to_string()
    } else {
        format!("{binding_id}:{discriminant}")
    }
}

/// Owns the in-memory mirror of `session-map.json`.
pub struct SessionMap {
    dir: PathBuf,
    entries: RwLock<HashMap<String, String>>,
    guard: GenerationGuard,
}

impl SessionMap {
    /// Load `session-map.json` from `dir` (missing/malformed treated as
    /// empty).
    #[must_use]
    pub fn open(dir: PathBuf) -> Self {
        let entries = load_from_disk(&dir);
        Self {
            dir,
            entries: RwLock::new(entries),
            guard: GenerationGuard::new(),
        }
    }

    /// The session id bound to `key`, if one has been recorded.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().expect("session map lock poisoned").get(key).cloned()
    }

    /// Record `key → session_id` and persist.
    pub fn set(&self, key: &str, session_id: &str) -> Result<(), RouterError> {
        let mut entries = self.entries.write().expect("session map lock poisoned");
        entries.insert(key.to_string(), session_id.to_string());
        save_to_disk(&self.dir, &entries)?;
        self.guard.mark_saved();
        Ok(())
    }

    /// The generation guard coordinating this map's own writes with its
    /// filesystem watcher.
    #[must_use]
    pub fn generation_guard(&self) -> &GenerationGuard {
        &self.guard
    }

    /// Root directory `session-map.json` lives under.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Re-read `session-map.json` from disk, replacing the in-memory
    /// mirror.
    pub fn reload(&self) {
        let fresh = load_from_disk(&self.dir);
        *self.entries.write().expect("session map lock poisoned") = fresh;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let map = SessionMap::open(dir.path().to_path_buf());
        map.set("b1:123", "sess-1").unwrap();
        assert_eq!(map.get("b1:123"), Some("sess-1".to_string()));
    }

    #[test]
    fn set_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let map = SessionMap::open(dir.path().to_path_buf());
        map.set("b1:123", "sess-1").unwrap();

        let reopened = SessionMap::open(dir.path().to_path_buf());
        assert_eq!(reopened.get("b1:123"), Some("sess-1".to_string()));
    }

    #[test]
    fn session_key_omits_colon_for_shared_strategy() {
        assert_eq!(session_key("b1", ""), "b1");
        assert_eq!(session_key("b1", "123"), "b1:123");
    }
}
