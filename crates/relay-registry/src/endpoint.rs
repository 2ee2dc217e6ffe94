// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`EndpointRegistry`] — concrete subjects that each own a Maildir.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use relay_maildir::MaildirStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::RegistryError;

/// A registered, concrete subject and the Maildir it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// The concrete subject this endpoint answers to.
    pub subject: String,
    /// Deterministic truncated SHA-256 of `subject` (12 hex chars).
    pub hash: String,
    /// Filesystem path of the endpoint's mailbox directory.
    pub maildir_path: String,
    /// When the endpoint was registered.
    pub registered_at: DateTime<Utc>,
}

/// Truncated SHA-256 of `subject`, 12 hex characters, used as a
/// filesystem-safe directory name.
#[must_use]
pub fn endpoint_hash(subject: &str) -> String {
    let digest = Sha256::digest(subject.as_bytes());
    let hex = hex_encode(&digest);
    hex[..12].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to String cannot fail");
    }
    s
}

/// In-memory map of endpoints keyed by subject, with a secondary lookup by
/// hash, backed by a [`MaildirStore`] for directory lifecycle.
pub struct EndpointRegistry {
    maildir: MaildirStore,
    by_subject: RwLock<HashMap<String, EndpointInfo>>,
    by_hash: RwLock<HashMap<String, String>>,
}

impl EndpointRegistry {
    /// Construct an empty registry rooted at `maildir`.
    #[must_use]
    pub fn new(maildir: MaildirStore) -> Self {
        Self {
            maildir,
            by_subject: RwLock::new(HashMap::new()),
            by_hash: RwLock::new(HashMap::new()),
        }
    }

    /// The underlying Maildir store.
    #[must_use]
    pub fn maildir(&self) -> &MaildirStore {
        &self.maildir
    }

    /// Validate, reject wildcards, create the endpoint's four subdirs, and
    /// record it. Fails on an invalid subject, a wildcard subject, or a
    /// subject that is already registered.
    pub fn register(&self, subject: &str) -> Result<EndpointInfo, RegistryError> {
        relay_subject::validate(subject)
            .map_err(|e| RegistryError::InvalidSubject(e.to_string()))?;
        if !relay_subject::is_concrete(subject) {
            return Err(RegistryError::InvalidSubject(format!(
                "{subject} contains a wildcard; endpoints must be concrete"
            )));
        }

        {
            let by_subject = self.by_subject.read().expect("registry lock poisoned");
            if by_subject.contains_key(subject) {
                return Err(RegistryError::AlreadyRegistered(subject.to_string()));
            }
        }

        let hash = endpoint_hash(subject);
        self.maildir.create_mailbox(&hash)?;

        let info = EndpointInfo {
            subject: subject.to_string(),
            hash: hash.clone(),
            maildir_path: self.maildir.root().join(&hash).display().to_string(),
            registered_at: Utc::now(),
        };

        self.by_subject
            .write()
            .expect("registry lock poisoned")
            .insert(subject.to_string(), info.clone());
        self.by_hash
            .write()
            .expect("registry lock poisoned")
            .insert(hash, subject.to_string());

        info!(target: "relay.registry", subject, "endpoint registered");
        Ok(info)
    }

    /// Remove `subject`'s in-memory record and delete its directory tree.
    /// Returns whether it existed.
    pub fn unregister(&self, subject: &str) -> Result<bool, RegistryError> {
        let removed = self
            .by_subject
            .write()
            .expect("registry lock poisoned")
            .remove(subject);

        let Some(info) = removed else {
            return Ok(false);
        };

        self.by_hash
            .write()
            .expect("registry lock poisoned")
            .remove(&info.hash);
        self.maildir.remove_mailbox(&info.hash)?;
        debug!(target: "relay.registry", subject, "endpoint unregistered");
        Ok(true)
    }

    /// Look up an endpoint by its exact subject.
    #[must_use]
    pub fn get(&self, subject: &str) -> Option<EndpointInfo> {
        self.by_subject
            .read()
            .expect("registry lock poisoned")
            .get(subject)
            .cloned()
    }

    /// Look up an endpoint by its hash.
    #[must_use]
    pub fn get_by_hash(&self, hash: &str) -> Option<EndpointInfo> {
        let by_hash = self.by_hash.read().expect("registry lock poisoned");
        let subject = by_hash.get(hash)?;
        self.get(subject)
    }

    /// Whether `subject` is currently registered.
    #[must_use]
    pub fn contains(&self, subject: &str) -> bool {
        self.by_subject
            .read()
            .expect("registry lock poisoned")
            .contains_key(subject)
    }

    /// All currently registered endpoints.
    #[must_use]
    pub fn list(&self) -> Vec<EndpointInfo> {
        let mut entries: Vec<_> = self
            .by_subject
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.subject.cmp(&b.subject));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> (TempDir, EndpointRegistry) {
        let dir = TempDir::new().unwrap();
        let registry = EndpointRegistry::new(MaildirStore::new(dir.path()));
        (dir, registry)
    }

    #[test]
    fn register_creates_record_and_mailbox() {
        let (dir, registry) = registry();
        let info = registry.register("relay.agent.s1").unwrap();
        assert_eq!(info.subject, "relay.agent.s1");
        assert!(dir.path().join(&info.hash).join("new").is_dir());
    }

    #[test]
    fn register_rejects_wildcard() {
        let (_dir, registry) = registry();
        let err = registry.register("relay.agent.*").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSubject(_)));
    }

    #[test]
    fn register_rejects_duplicate() {
        let (_dir, registry) = registry();
        registry.register("relay.agent.s1").unwrap();
        let err = registry.register("relay.agent.s1").unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
    }

    #[test]
    fn unregister_removes_record_and_directory() {
        let (dir, registry) = registry();
        let info = registry.register("relay.agent.s1").unwrap();
        assert!(registry.unregister("relay.agent.s1").unwrap());
        assert!(registry.get("relay.agent.s1").is_none());
        assert!(!dir.path().join(&info.hash).exists());
    }

    #[test]
    fn unregister_missing_returns_false() {
        let (_dir, registry) = registry();
        assert!(!registry.unregister("relay.agent.ghost").unwrap());
    }

    #[test]
    fn get_by_hash_resolves_to_same_record() {
        let (_dir, registry) = registry();
        let info = registry.register("relay.agent.s1").unwrap();
        let by_hash = registry.get_by_hash(&info.hash).unwrap();
        assert_eq!(by_hash.subject, "relay.agent.s1");
    }

    #[test]
    fn hash_is_deterministic_and_twelve_hex_chars() {
        let a = endpoint_hash("relay.agent.s1");
        let b = endpoint_hash("relay.agent.s1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
