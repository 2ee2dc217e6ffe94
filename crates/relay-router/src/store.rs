// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`BindingStore`] — persisted CRUD over `bindings.json`, resolve-by-score
//! lookups, and orphan detection, with generation-counter self-write
//! suppression for its filesystem watcher.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::binding::{score, Binding, BindingPatch, NewBinding};
use crate::error::RouterError;
use crate::generation::GenerationGuard;

const FILE_NAME: &str = "bindings.json";

fn load_from_disk(dir: &Path) -> Vec<Binding> {
    let path = dir.join(FILE_NAME);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str(&raw) {
        Ok(bindings) => bindings,
        Err(e) => {
            warn!(target: "relay.router", path = %path.display(), error = %e, "malformed bindings.json, treating as empty");
            Vec::new()
        }
    }
}

fn save_to_disk(dir: &Path, bindings: &[Binding]) -> Result<(), RouterError> {
    let path = dir.join(FILE_NAME);
    let tmp = dir.join(format!("{FILE_NAME}.tmp"));
    let body = serde_json::to_string_pretty(bindings).map_err(|e| RouterError::Io(e.to_string()))?;
    std::fs::write(&tmp, body).map_err(|e| RouterError::Io(e.to_string()))?;
    std::fs::rename(&tmp, &path).map_err(|e| RouterError::Io(e.to_string()))?;
    Ok(())
}

/// Owns the in-memory mirror of `bindings.json`, the canonical source of
/// truth being the file itself.
pub struct BindingStore {
    dir: PathBuf,
    bindings: RwLock<Vec<Binding>>,
    guard: GenerationGuard,
}

impl BindingStore {
    /// Load `bindings.json` from `dir` (treating a missing or malformed
    /// file as empty, per the Adapter Manager's tolerance contract).
    #[must_use]
    pub fn open(dir: PathBuf) -> Self {
        let bindings = load_from_disk(&dir);
        Self {
            dir,
            bindings: RwLock::new(bindings),
            guard: GenerationGuard::new(),
        }
    }

    fn persist(&self, bindings: &[Binding]) -> Result<(), RouterError> {
        save_to_disk(&self.dir, bindings)?;
        self.guard.mark_saved();
        Ok(())
    }

    /// Every persisted binding.
    #[must_use]
    pub fn list(&self) -> Vec<Binding> {
        self.bindings.read().expect("binding store lock poisoned").clone()
    }

    /// Create a new binding, generating a UUID id and ISO-8601 timestamps.
    pub fn create(&self, input: NewBinding) -> Result<Binding, RouterError> {
        let now = Utc::now();
        let binding = Binding {
            id: Uuid::new_v4().to_string(),
            adapter_id: input.adapter_id,
            agent_id: input.agent_id,
            project_path: input.project_path,
            session_strategy: input.session_strategy.unwrap_or_default(),
            label: input.label.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            chat_id: input.chat_id,
            channel_type: input.channel_type,
        };

        let mut bindings = self.bindings.write().expect("binding store lock poisoned");
        bindings.push(binding.clone());
        self.persist(&bindings)?;
        Ok(binding)
    }

    /// Remove a binding by id. Only persists if an entry was actually
    /// removed.
    pub fn delete(&self, id: &str) -> Result<bool, RouterError> {
        let mut bindings = self.bindings.write().expect("binding store lock poisoned");
        let before = bindings.len();
        bindings.retain(|b| b.id != id);
        let removed = bindings.len() != before;
        if removed {
            self.persist(&bindings)?;
        }
        Ok(removed)
    }

    /// Apply a sparse patch to an existing binding, bumping `updatedAt`.
    pub fn update(&self, id: &str, patch: BindingPatch) -> Result<Binding, RouterError> {
        let mut bindings = self.bindings.write().expect("binding store lock poisoned");
        let binding = bindings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| RouterError::NotFound(id.to_string()))?;

        if let Some(agent_id) = patch.agent_id {
            binding.agent_id = agent_id;
        }
        if let Some(project_path) = patch.project_path {
            binding.project_path = project_path;
        }
        if let Some(strategy) = patch.session_strategy {
            binding.session_strategy = strategy;
        }
        if let Some(label) = patch.label {
            binding.label = label;
        }
        if let Some(chat_id) = patch.chat_id {
            binding.chat_id = chat_id;
        }
        if let Some(channel_type) = patch.channel_type {
            binding.channel_type = channel_type;
        }
        binding.updated_at = Utc::now();
        let updated = binding.clone();

        self.persist(&bindings)?;
        Ok(updated)
    }

    /// Resolve the highest-scoring binding for `adapterId` against an
    /// inbound `(chatId?, channelType?)` pair, ties broken by creation
    /// order.
    #[must_use]
    pub fn resolve(&self, adapter_id: &str, chat_id: Option<&str>, channel_type: Option<&str>) -> Option<Binding> {
        let bindings = self.bindings.read().expect("binding store lock poisoned");
        bindings
            .iter()
            .filter(|b| b.adapter_id == adapter_id)
            .filter_map(|b| score(b, chat_id, channel_type).map(|s| (s, b)))
            .max_by(|(score_a, a), (score_b, b)| score_a.cmp(score_b).then(b.created_at.cmp(&a.created_at).reverse()))
            .map(|(_, b)| b.clone())
    }

    /// Bindings whose `adapterId` is not present in `known_adapter_ids`.
    #[must_use]
    pub fn get_orphaned(&self, known_adapter_ids: &[String]) -> Vec<Binding> {
        self.bindings
            .read()
            .expect("binding store lock poisoned")
            .iter()
            .filter(|b| !known_adapter_ids.iter().any(|id| id == &b.adapter_id))
            .cloned()
            .collect()
    }

    /// The generation guard coordinating this store's own writes with its
    /// filesystem watcher.
    #[must_use]
    pub fn generation_guard(&self) -> &GenerationGuard {
        &self.guard
    }

    /// Root directory `bindings.json` lives under.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Re-read `bindings.json` from disk, replacing the in-memory mirror.
    /// Intended to be called by a watcher after [`GenerationGuard::should_reload`]
    /// returns `true`.
    pub fn reload(&self) {
        let fresh = load_from_disk(&self.dir);
        *self.bindings.write().expect("binding store lock poisoned") = fresh;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, BindingStore) {
        let dir = TempDir::new().unwrap();
        let store = BindingStore::open(dir.path().to_path_buf());
        (dir, store)
    }

    fn new_binding(adapter_id: &str, chat_id: Option<&str>) -> NewBinding {
        NewBinding {
            adapter_id: adapter_id.to_string(),
            agent_id: "a1".to_string(),
            project_path: "/p".to_string(),
            chat_id: chat_id.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn create_defaults_strategy_to_per_chat_and_persists() {
        let (dir, store) = store();
        let b = store.create(new_binding("tg-1", Some("123"))).unwrap();
        assert_eq!(b.session_strategy, crate::binding::SessionStrategy::PerChat);
        assert_eq!(b.label, "");

        let reloaded = BindingStore::open(dir.path().to_path_buf());
        assert_eq!(reloaded.list().len(), 1);
    }

    #[test]
    fn delete_only_persists_on_actual_removal() {
        let (_dir, store) = store();
        store.create(new_binding("tg-1", Some("123"))).unwrap();
        assert!(!store.delete("ghost").unwrap());
        assert!(store.delete(&store.list()[0].id.clone()).unwrap());
        assert!(store.list().is_empty());
    }

    #[test]
    fn resolve_prefers_highest_score() {
        let (_dir, store) = store();
        let wildcard = store.create(new_binding("tg-1", None)).unwrap();
        let exact = store.create(new_binding("tg-1", Some("123"))).unwrap();
        let resolved = store.resolve("tg-1", Some("123"), None).unwrap();
        assert_eq!(resolved.id, exact.id);
        assert_ne!(resolved.id, wildcard.id);
    }

    #[test]
    fn resolve_returns_none_when_all_disqualified() {
        let (_dir, store) = store();
        store.create(new_binding("tg-1", Some("999"))).unwrap();
        assert!(store.resolve("tg-1", Some("123"), None).is_none());
    }

    #[test]
    fn get_orphaned_finds_bindings_with_unknown_adapter() {
        let (_dir, store) = store();
        store.create(new_binding("tg-1", Some("123"))).unwrap();
        store.create(new_binding("tg-2", Some("456"))).unwrap();
        let orphans = store.get_orphaned(&["tg-1".to_string()]);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].adapter_id, "tg-2");
    }

    #[test]
    fn malformed_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(FILE_NAME), "not json").unwrap();
        let store = BindingStore::open(dir.path().to_path_buf());
        assert!(store.list().is_empty());
    }
}
