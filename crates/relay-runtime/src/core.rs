// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`RelayCore`] — the publish/match/enforce/fan-out delivery pipeline
//! (§4.7), tying the subject matcher, budget enforcer, Maildir store,
//! SQLite index, registries, and reliability gates together.

use std::path::Path;
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use relay_config::ResolvedOptions;
use relay_envelope::{
    enforce_budget, Budget, Envelope, ErrorCode, IndexedMessage, MessageStatus, RelayError, Signal,
    SignalKind, TraceSpan, TraceStatus,
};
use relay_index::SqliteIndex;
use relay_maildir::MaildirStore;
use relay_reliability::{check_backpressure, check_rate_limit, CircuitBreaker};
use relay_registry::{EndpointInfo, EndpointRegistry, Handler, RegistryError, SubscriptionRegistry};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::access::{AccessControl, AccessDecision};
use crate::recently_dispatched::RecentlyDispatched;
use crate::signal_bus::SignalBus;

/// Inputs to a [`RelayCore::publish`] call beyond the subject and payload.
#[derive(Debug, Clone, Default)]
pub struct PublishOpts {
    /// Sender subject, for attribution, access control, and rate limiting.
    pub from: String,
    /// Optional subject for responses.
    pub reply_to: Option<String>,
    /// Override budget. Absent means a fresh budget built from configured
    /// defaults.
    pub budget: Option<Budget>,
}

/// Outcome of a successful [`RelayCore::publish`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// The published envelope's id.
    pub message_id: String,
    /// Number of endpoints the envelope was actually persisted to.
    pub delivered_to: usize,
}

/// The delivery pipeline: owns every subsystem and exposes `publish`,
/// `subscribe`, and the filesystem-watch fallback's claim/dispatch helper.
pub struct RelayCore {
    maildir: MaildirStore,
    endpoints: EndpointRegistry,
    subscriptions: SubscriptionRegistry,
    index: SqliteIndex,
    circuit_breaker: CircuitBreaker,
    options: ResolvedOptions,
    access_control: RwLock<AccessControl>,
    signals: SignalBus,
    recently_dispatched: Mutex<RecentlyDispatched>,
}

impl RelayCore {
    /// Build a core rooted at `data_dir`, creating `mailboxes/` and
    /// `index.db` as needed.
    pub fn open(data_dir: &Path, options: ResolvedOptions) -> Result<Self, RelayError> {
        let maildir = MaildirStore::new(data_dir.join("mailboxes"));
        let endpoints = EndpointRegistry::new(maildir.clone());
        let subscriptions = SubscriptionRegistry::new();
        let index = SqliteIndex::open(data_dir.join("index.db"))
            .map_err(|e| RelayError::new(ErrorCode::IndexUnavailable, e.to_string()))?;
        let circuit_breaker = CircuitBreaker::new(options.circuit_breaker.clone());
        let cap = options.recently_dispatched_cap;
        let access_control_default_deny = options.access_control_default_deny;

        info!(target: "relay.core", data_dir = %data_dir.display(), "relay core opened");

        Ok(Self {
            maildir,
            endpoints,
            subscriptions,
            index,
            circuit_breaker,
            options,
            access_control: RwLock::new(AccessControl::new(Vec::new()).with_default_deny(access_control_default_deny)),
            signals: SignalBus::new(),
            recently_dispatched: Mutex::new(RecentlyDispatched::new(cap)),
        })
    }

    /// The endpoint registry (registration, lookup).
    #[must_use]
    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    /// The underlying Maildir store.
    #[must_use]
    pub fn maildir(&self) -> &MaildirStore {
        &self.maildir
    }

    /// The SQLite index.
    #[must_use]
    pub fn index(&self) -> &SqliteIndex {
        &self.index
    }

    /// The ephemeral signal bus.
    #[must_use]
    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    /// Replace the access control rule list wholesale.
    pub fn set_access_control(&self, access_control: AccessControl) {
        *self.access_control.write().expect("access control lock poisoned") = access_control;
    }

    /// Register a wildcard-pattern subscription.
    pub fn subscribe(&self, pattern: &str, handler: Handler) -> Result<String, RelayError> {
        Ok(self.subscriptions.subscribe(pattern, handler)?)
    }

    /// Remove a subscription by id. Returns whether it existed.
    #[must_use]
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    /// Register `subject` as a concrete endpoint if it isn't already,
    /// returning its info either way. Used by callers that may be the
    /// first to address a newly-seen subject, such as an adapter's first
    /// message from a fresh chat or a binding's first republish to a new
    /// session.
    pub fn ensure_endpoint(&self, subject: &str) -> Result<EndpointInfo, RelayError> {
        if let Some(info) = self.endpoints.get(subject) {
            return Ok(info);
        }
        match self.endpoints.register(subject) {
            Ok(info) => Ok(info),
            Err(RegistryError::AlreadyRegistered(_)) => self.endpoints.get(subject).ok_or_else(|| {
                RelayError::new(ErrorCode::InternalError, format!("endpoint {subject} vanished after AlreadyRegistered"))
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn fresh_budget(&self) -> Budget {
        Budget {
            hop_count: 0,
            max_hops: self.options.max_hops,
            ancestor_chain: Vec::new(),
            ttl: now_ms() + self.options.default_ttl_ms,
            call_budget_remaining: self.options.default_call_budget,
        }
    }

    /// Run the full publish pipeline for `subject`/`payload` (§4.7).
    pub fn publish(
        &self,
        subject: &str,
        payload: serde_json::Value,
        opts: PublishOpts,
    ) -> Result<PublishResult, RelayError> {
        relay_subject::validate(subject)
            .map_err(|e| RelayError::new(ErrorCode::InvalidSubject, e.to_string()))?;

        let budget = opts.budget.unwrap_or_else(|| self.fresh_budget());
        let envelope = Envelope::new(subject, opts.from, opts.reply_to, payload, budget);
        let trace_id = envelope.id.clone();

        let endpoint = self.endpoints.get(subject);

        let window_start = Utc::now() - chrono::Duration::seconds(self.options.rate_limit.window_secs as i64);
        let sender_count = self
            .index
            .count_by_sender_since(&envelope.from, window_start)
            .map_err(|e| RelayError::new(ErrorCode::IndexQueryFailed, e.to_string()))?;
        let rate_decision = check_rate_limit(&envelope.from, sender_count, &self.options.rate_limit);
        if !rate_decision.allowed {
            warn!(target: "relay.core", from = %envelope.from, "publish rate limited");
            self.signals.emit(Signal::new(
                subject,
                SignalKind::RateLimited {
                    current: rate_decision.current_count.unwrap_or(sender_count),
                    limit: rate_decision.limit.unwrap_or(0),
                },
            ));
            if let Some(info) = &endpoint {
                self.dead_letter(&info.hash, &envelope, &trace_id, "rate limited")?;
            }
            return Ok(PublishResult {
                message_id: envelope.id,
                delivered_to: 0,
            });
        }

        let access_decision = self
            .access_control
            .read()
            .expect("access control lock poisoned")
            .evaluate(&envelope.from, subject);
        if let AccessDecision::Denied { rule_id } = access_decision {
            let reason = format!("access denied: {rule_id}");
            warn!(target: "relay.core", from = %envelope.from, to = subject, %reason, "publish denied");
            if let Some(info) = &endpoint {
                self.dead_letter(&info.hash, &envelope, &trace_id, &reason)?;
            }
            return Ok(PublishResult {
                message_id: envelope.id,
                delivered_to: 0,
            });
        }

        let Some(info) = endpoint else {
            debug!(target: "relay.core", subject, "publish matched no registered endpoint");
            return Ok(PublishResult {
                message_id: envelope.id,
                delivered_to: 0,
            });
        };

        let admitted = match enforce_budget(&envelope.budget, &info.hash, None) {
            Ok(admitted) => admitted,
            Err(e) => {
                self.dead_letter(&info.hash, &envelope, &trace_id, &e.message)?;
                return Ok(PublishResult {
                    message_id: envelope.id,
                    delivered_to: 0,
                });
            }
        };
        let envelope = envelope.with_budget(admitted.updated_budget);

        let now = now_ms();
        if self.options.circuit_breaker.enabled && !self.circuit_breaker.check(&info.hash, now) {
            self.dead_letter(&info.hash, &envelope, &trace_id, "circuit open")?;
            return Ok(PublishResult {
                message_id: envelope.id,
                delivered_to: 0,
            });
        }

        let mailbox = self.maildir.mailbox(&info.hash);
        let current_size = mailbox
            .count_new()
            .map_err(|e| RelayError::new(ErrorCode::DeliveryFailed, e.to_string()))?;
        let bp_decision = check_backpressure(current_size as u64, &self.options.backpressure);
        if !bp_decision.allowed {
            let reason = format!(
                "mailbox full ({}/{})",
                current_size, self.options.backpressure.max_mailbox_size
            );
            self.dead_letter(&info.hash, &envelope, &trace_id, &reason)?;
            return Ok(PublishResult {
                message_id: envelope.id,
                delivered_to: 0,
            });
        }
        if bp_decision.warn {
            self.signals.emit(Signal::new(
                subject,
                SignalKind::Backpressure {
                    pressure: bp_decision.pressure,
                    rejected: false,
                },
            ));
        }

        let span_id = Ulid::new().to_string();
        let sent_at = envelope.created_at;
        let mut span = TraceSpan {
            message_id: String::new(),
            trace_id: trace_id.clone(),
            span_id: span_id.clone(),
            parent_span_id: None,
            subject: subject.to_string(),
            from_endpoint: envelope.from.clone(),
            to_endpoint: info.hash.clone(),
            status: TraceStatus::Pending,
            budget_hops_used: envelope.budget.hop_count,
            budget_ttl_remaining_ms: envelope.budget.ttl - now,
            sent_at,
            delivered_at: None,
            processed_at: None,
            error: None,
        };

        let filename = mailbox
            .deliver(&envelope)
            .map_err(|e| RelayError::new(ErrorCode::DeliveryFailed, e.to_string()))?;
        span.message_id = filename.clone();
        span.status = TraceStatus::Delivered;
        span.delivered_at = Some(Utc::now());
        self.record_span(&span);

        self.index
            .insert_message(&IndexedMessage {
                id: filename.clone(),
                subject: subject.to_string(),
                sender: envelope.from.clone(),
                endpoint_hash: info.hash.clone(),
                status: MessageStatus::New,
                created_at: envelope.created_at,
                ttl: envelope.budget.ttl,
            })
            .map_err(|e| RelayError::new(ErrorCode::IndexQueryFailed, e.to_string()))?;

        if !self.subscriptions.get_subscribers(subject).is_empty() {
            self.claim_and_dispatch(subject, &info.hash, &filename);

            let mut recently = self.recently_dispatched.lock().expect("recently-dispatched lock poisoned");
            recently.insert(filename);
            drop(recently);
        }

        Ok(PublishResult {
            message_id: trace_id,
            delivered_to: 1,
        })
    }

    /// Claim `filename` in `endpoint_hash`'s mailbox and invoke matching
    /// subscriber handlers: success completes the message and records a
    /// breaker success; a handler error fails it with the error's reason
    /// and records a breaker failure. Used both right after persistence in
    /// [`Self::publish`] and by the filesystem-watch fallback for files the
    /// watcher discovers that are not already in the recently-dispatched
    /// set. On POSIX exactly one caller wins the underlying claim; a lost
    /// race is not an error, it just means another path already has it.
    pub fn claim_and_dispatch(&self, subject: &str, endpoint_hash: &str, filename: &str) {
        let mailbox = self.maildir.mailbox(endpoint_hash);
        let claimed = match mailbox.claim(filename) {
            Ok(claimed) => claimed,
            Err(e) => {
                debug!(target: "relay.core", filename, error = %e, "claim lost race or file missing");
                return;
            }
        };

        let mut span = TraceSpan {
            message_id: filename.to_string(),
            trace_id: claimed.envelope.id.clone(),
            span_id: Ulid::new().to_string(),
            parent_span_id: None,
            subject: subject.to_string(),
            from_endpoint: claimed.envelope.from.clone(),
            to_endpoint: endpoint_hash.to_string(),
            status: TraceStatus::Delivered,
            budget_hops_used: claimed.envelope.budget.hop_count,
            budget_ttl_remaining_ms: claimed.envelope.budget.ttl - now_ms(),
            sent_at: claimed.envelope.created_at,
            delivered_at: Some(Utc::now()),
            processed_at: None,
            error: None,
        };

        let subscribers = self.subscriptions.get_subscribers(subject);
        let mut failure = None;
        for sub in &subscribers {
            if let Some(handler) = &sub.handler {
                if let Err(e) = handler(&claimed.envelope) {
                    failure = Some(e.message);
                    break;
                }
            }
        }

        match failure {
            None => {
                if let Err(e) = mailbox.complete(filename) {
                    warn!(target: "relay.core", filename, error = %e, "complete failed after successful dispatch");
                }
                let _ = self.index.update_status(filename, MessageStatus::Processed);
                self.circuit_breaker.record_success(endpoint_hash);
                span.status = TraceStatus::Processed;
                span.processed_at = Some(Utc::now());
                self.record_span(&span);
            }
            Some(reason) => {
                if let Err(e) = mailbox.fail(filename, &claimed.envelope, &reason, endpoint_hash) {
                    warn!(target: "relay.core", filename, error = %e, "fail transition failed");
                }
                let _ = self.index.update_status(filename, MessageStatus::Failed);
                self.circuit_breaker.record_failure(endpoint_hash, now_ms());
                span.status = TraceStatus::Failed;
                span.error = Some(reason);
                self.record_span(&span);
            }
        }
    }

    fn dead_letter(&self, endpoint_hash: &str, envelope: &Envelope, trace_id: &str, reason: &str) -> Result<(), RelayError> {
        let mailbox = self.maildir.mailbox(endpoint_hash);
        mailbox
            .fail_direct(envelope, reason, endpoint_hash)
            .map_err(|e| RelayError::new(ErrorCode::DeliveryFailed, e.to_string()))?;

        let span = TraceSpan {
            message_id: envelope.id.clone(),
            trace_id: trace_id.to_string(),
            span_id: Ulid::new().to_string(),
            parent_span_id: None,
            subject: envelope.subject.clone(),
            from_endpoint: envelope.from.clone(),
            to_endpoint: endpoint_hash.to_string(),
            status: TraceStatus::DeadLettered,
            budget_hops_used: envelope.budget.hop_count,
            budget_ttl_remaining_ms: envelope.budget.ttl - now_ms(),
            sent_at: envelope.created_at,
            delivered_at: None,
            processed_at: None,
            error: Some(reason.to_string()),
        };
        self.record_span(&span);
        Ok(())
    }

    fn record_span(&self, span: &TraceSpan) {
        if let Err(e) = self.index.record_span(span) {
            warn!(target: "relay.core", error = %e, "failed to record trace span");
        }
    }

    /// Whether `filename` was already dispatched by the synchronous publish
    /// path, for the filesystem-watch fallback to consult.
    #[must_use]
    pub fn was_recently_dispatched(&self, filename: &str) -> bool {
        self.recently_dispatched
            .lock()
            .expect("recently-dispatched lock poisoned")
            .contains(filename)
    }

    /// Ordered shutdown (§4.7): the caller is expected to have already
    /// stopped filesystem watchers and closed stream clients before calling
    /// this. Flushes nothing that needs explicit flushing (the signal bus
    /// has no buffered state beyond its broadcast channel) and releases
    /// in-memory endpoint/subscription records. Mailboxes and the SQLite
    /// file are left on disk.
    pub fn shutdown(&self) {
        info!(target: "relay.core", "relay core shutting down");
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
