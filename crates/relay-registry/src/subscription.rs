// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`SubscriptionRegistry`] — wildcard-pattern subscriptions keyed by a
//! monotonic ULID.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use relay_envelope::{Envelope, RelayError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::error::RegistryError;

/// A subscriber callback. Returning `Err` marks the delivery as a handler
/// failure (breaker `recordFailure`, Maildir `fail`).
pub type Handler = Arc<dyn Fn(&Envelope) -> Result<(), RelayError> + Send + Sync>;

/// A live or restored subscription entry.
#[derive(Clone)]
pub struct Subscription {
    /// Monotonic lexicographic id (ULID).
    pub id: String,
    /// The wildcard pattern this subscription matches against.
    pub pattern: String,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
    /// The callback. `None` for an entry restored from disk that has not
    /// yet been re-attached by a live consumer.
    pub handler: Option<Handler>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("created_at", &self.created_at)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// The JSON-persisted shape of a subscription: pattern and metadata only,
/// never the handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSubscription {
    id: String,
    pattern: String,
    created_at: DateTime<Utc>,
}

/// In-memory registry of subscriptions, with pattern persistence to a JSON
/// file for restart visibility. Handlers never survive a restart; restored
/// entries carry a no-op handler so listings still show prior patterns.
pub struct SubscriptionRegistry {
    entries: RwLock<BTreeMap<String, Subscription>>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register `handler` for `pattern`, returning the new subscription id.
    pub fn subscribe(&self, pattern: &str, handler: Handler) -> Result<String, RegistryError> {
        relay_subject::validate(pattern).map_err(|e| RegistryError::InvalidSubject(e.to_string()))?;

        let id = Ulid::new().to_string();
        let entry = Subscription {
            id: id.clone(),
            pattern: pattern.to_string(),
            created_at: Utc::now(),
            handler: Some(handler),
        };
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(id.clone(), entry);
        debug!(target: "relay.registry", pattern, id = %id, "subscribed");
        Ok(id)
    }

    /// Remove a subscription by id. Returns whether it existed.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .remove(id)
            .is_some()
    }

    /// Every subscription whose pattern matches `subject`, found by a
    /// linear scan of all entries. Entries with no live handler (restored
    /// from disk, not yet re-subscribed) are skipped.
    #[must_use]
    pub fn get_subscribers(&self, subject: &str) -> Vec<Subscription> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|s| s.handler.is_some() && relay_subject::matches_pattern(subject, &s.pattern))
            .cloned()
            .collect()
    }

    /// Every subscription, live or restored, sorted by id (insertion order).
    #[must_use]
    pub fn list(&self) -> Vec<Subscription> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Serialize patterns (not handlers) to JSON for persistence.
    pub fn to_json(&self) -> Result<String, RegistryError> {
        let persisted: Vec<PersistedSubscription> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .map(|s| PersistedSubscription {
                id: s.id.clone(),
                pattern: s.pattern.clone(),
                created_at: s.created_at,
            })
            .collect();
        serde_json::to_string_pretty(&persisted)
            .map_err(|e| RegistryError::Persistence(e.to_string()))
    }

    /// Restore entries from previously persisted JSON. Restored entries get
    /// a no-op handler; consumers must call [`Self::subscribe`] again (the
    /// restored id is not reused) to reattach live behavior.
    pub fn restore_from_json(&self, json: &str) -> Result<usize, RegistryError> {
        let persisted: Vec<PersistedSubscription> =
            serde_json::from_str(json).map_err(|e| RegistryError::Persistence(e.to_string()))?;
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let count = persisted.len();
        for p in persisted {
            entries.insert(
                p.id.clone(),
                Subscription {
                    id: p.id,
                    pattern: p.pattern,
                    created_at: p.created_at,
                    handler: None,
                },
            );
        }
        if count > 0 {
            warn!(target: "relay.registry", count, "restored subscriptions with no-op handlers; re-subscribe to reattach");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_envelope::Budget;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn no_op() -> Handler {
        Arc::new(|_| Ok(()))
    }

    #[test]
    fn subscribe_and_match_pattern() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("relay.agent.>", no_op()).unwrap();
        let subs = registry.get_subscribers("relay.agent.s1");
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn subscribe_rejects_invalid_pattern() {
        let registry = SubscriptionRegistry::new();
        let err = registry.subscribe("relay..bad", no_op()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSubject(_)));
    }

    #[test]
    fn unsubscribe_removes_entry() {
        let registry = SubscriptionRegistry::new();
        let id = registry.subscribe("relay.agent.s1", no_op()).unwrap();
        assert!(registry.unsubscribe(&id));
        assert!(registry.get_subscribers("relay.agent.s1").is_empty());
    }

    #[test]
    fn unsubscribe_missing_returns_false() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.unsubscribe("nonexistent"));
    }

    #[test]
    fn get_subscribers_invokes_counted_handler() {
        let registry = SubscriptionRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let handler: Handler = Arc::new(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        registry.subscribe("relay.agent.*", handler).unwrap();

        let subs = registry.get_subscribers("relay.agent.s1");
        let envelope = Envelope::new(
            "relay.agent.s1",
            "relay.human.cli",
            None,
            serde_json::json!("hi"),
            Budget::fresh(),
        );
        for sub in &subs {
            (sub.handler.as_ref().unwrap())(&envelope).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn persist_and_restore_round_trips_patterns_with_no_op_handler() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("relay.agent.>", no_op()).unwrap();
        registry.subscribe("relay.human.*", no_op()).unwrap();
        let json = registry.to_json().unwrap();

        let restored = SubscriptionRegistry::new();
        let count = restored.restore_from_json(&json).unwrap();
        assert_eq!(count, 2);

        let patterns: Vec<_> = restored.list().iter().map(|s| s.pattern.clone()).collect();
        assert!(patterns.contains(&"relay.agent.>".to_string()));
        assert!(patterns.contains(&"relay.human.*".to_string()));

        assert!(restored.get_subscribers("relay.agent.s1").is_empty());
    }
}
