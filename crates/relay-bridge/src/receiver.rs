// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`MessageReceiver`]: the bridge between the relay bus and the agent
//! runtime. Subscribes `relay.agent.>` (session turns, streamed back via
//! `replyTo`) and `relay.system.pulse.>` (one-shot scheduled dispatches
//! reporting back to an external run tracker).

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use relay_agent_iface::{AgentSessionCreator, PermissionMode, StreamEvent};
use relay_envelope::{Envelope, ErrorCode, RelayError, TraceSpan, TraceStatus};
use relay_runtime::{PublishOpts, RelayCore};
use tokio::sync::mpsc;
use tracing::warn;
use ulid::Ulid;

use crate::error::BridgeError;
use crate::pulse::{cap_summary, PulseDispatchPayload, PulseRunStatus, PulseRunUpdate, PulseRunUpdater};

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn pending_span(envelope: &Envelope, to_endpoint: &str) -> TraceSpan {
    TraceSpan {
        message_id: envelope.id.clone(),
        trace_id: envelope.id.clone(),
        span_id: Ulid::new().to_string(),
        parent_span_id: None,
        subject: envelope.subject.clone(),
        from_endpoint: envelope.from.clone(),
        to_endpoint: to_endpoint.to_string(),
        status: TraceStatus::Pending,
        budget_hops_used: envelope.budget.hop_count,
        budget_ttl_remaining_ms: envelope.budget.ttl - now_ms(),
        sent_at: envelope.created_at,
        delivered_at: None,
        processed_at: None,
        error: None,
    }
}

/// Bridges `relay.agent.>` turns and `relay.system.pulse.>` dispatches to
/// an [`AgentSessionCreator`]-backed agent runtime.
pub struct MessageReceiver {
    core: Arc<RelayCore>,
    creator: Arc<dyn AgentSessionCreator>,
    updater: Arc<dyn PulseRunUpdater>,
    default_cwd: String,
    runtime: tokio::runtime::Handle,
    agent_sub_id: std::sync::Mutex<Option<String>>,
    pulse_sub_id: std::sync::Mutex<Option<String>>,
}

impl MessageReceiver {
    /// Build a receiver over `core`, driving sessions through `creator`
    /// and reporting Pulse outcomes through `updater`. `default_cwd` is
    /// used when a pulse dispatch omits `cwd`.
    #[must_use]
    pub fn new(
        core: Arc<RelayCore>,
        creator: Arc<dyn AgentSessionCreator>,
        updater: Arc<dyn PulseRunUpdater>,
        default_cwd: String,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            core,
            creator,
            updater,
            default_cwd,
            runtime,
            agent_sub_id: std::sync::Mutex::new(None),
            pulse_sub_id: std::sync::Mutex::new(None),
        }
    }

    /// Subscribe both patterns against the relay core. Idempotent to call
    /// once; calling twice leaks the first subscription.
    pub fn start(self: &Arc<Self>) -> Result<(), BridgeError> {
        let this = Arc::clone(self);
        let agent_id = self
            .core
            .subscribe("relay.agent.>", Arc::new(move |e: &Envelope| this.handle_agent(e)))
            .map_err(|e| BridgeError::SubscribeFailed {
                pattern: "relay.agent.>".to_string(),
                reason: e.message,
            })?;
        *self.agent_sub_id.lock().unwrap() = Some(agent_id);

        let this = Arc::clone(self);
        let pulse_id = self
            .core
            .subscribe("relay.system.pulse.>", Arc::new(move |e: &Envelope| this.handle_pulse(e)))
            .map_err(|e| BridgeError::SubscribeFailed {
                pattern: "relay.system.pulse.>".to_string(),
                reason: e.message,
            })?;
        *self.pulse_sub_id.lock().unwrap() = Some(pulse_id);
        Ok(())
    }

    /// Unsubscribe both patterns. Idempotent.
    pub fn stop(&self) {
        if let Some(id) = self.agent_sub_id.lock().unwrap().take() {
            self.core.unsubscribe(&id);
        }
        if let Some(id) = self.pulse_sub_id.lock().unwrap().take() {
            self.core.unsubscribe(&id);
        }
    }

    fn handle_agent(&self, envelope: &Envelope) -> Result<(), RelayError> {
        let session_id = envelope
            .subject
            .split('.')
            .nth(2)
            .ok_or_else(|| RelayError::new(ErrorCode::InvalidSubject, format!("{} has no session id segment", envelope.subject)))?
            .to_string();

        let mut span = pending_span(envelope, &format!("relay.agent.{session_id}"));
        if let Err(e) = self.core.index().record_span(&span) {
            warn!(target: "relay.bridge", error = %e, "failed to record pending span");
        }

        let content = envelope.payload_text();
        let reply_to = envelope.reply_to.clone();
        let budget = envelope.budget.clone();
        let creator = Arc::clone(&self.creator);
        let core = Arc::clone(&self.core);
        let cwd = self.default_cwd.clone();
        let session_id_for_block = session_id.clone();

        let runtime = self.runtime.clone();
        let result = tokio::task::block_in_place(move || runtime.block_on(async move {
            let session = creator
                .ensure_session(&session_id_for_block, &cwd, PermissionMode::default())
                .await?;

            let (tx, mut rx) = mpsc::channel::<StreamEvent>(32);
            let consumer_core = Arc::clone(&core);
            let consumer_reply_to = reply_to.clone();
            let consumer_budget = budget.clone();
            let consumer_session_id = session_id_for_block.clone();
            let consumer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let Some(reply_to) = &consumer_reply_to else { continue };
                    let payload = match serde_json::to_value(&event) {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(target: "relay.bridge", error = %e, "failed to serialize stream event");
                            continue;
                        }
                    };
                    if let Err(e) = consumer_core.ensure_endpoint(reply_to) {
                        warn!(target: "relay.bridge", error = %e, reply_to = %reply_to, "failed to ensure reply endpoint");
                        continue;
                    }
                    if let Err(e) = consumer_core.publish(
                        reply_to,
                        payload,
                        PublishOpts {
                            from: format!("relay.agent.{consumer_session_id}"),
                            reply_to: None,
                            budget: Some(consumer_budget.clone()),
                        },
                    ) {
                        warn!(target: "relay.bridge", error = %e, reply_to = %reply_to, "failed to publish stream event");
                    }
                }
            });

            let send_result = session.send_message(content, tx).await;
            let _ = consumer.await;
            send_result
        }));

        match result {
            Ok(()) => {
                span.status = TraceStatus::Processed;
                span.processed_at = Some(Utc::now());
                if let Err(e) = self.core.index().record_span(&span) {
                    warn!(target: "relay.bridge", error = %e, "failed to record processed span");
                }
                Ok(())
            }
            Err(e) => {
                span.status = TraceStatus::Failed;
                span.error = Some(e.to_string());
                if let Err(record_err) = self.core.index().record_span(&span) {
                    warn!(target: "relay.bridge", error = %record_err, "failed to record failed span");
                }
                Err(RelayError::new(ErrorCode::InternalError, e.to_string()))
            }
        }
    }

    fn handle_pulse(&self, envelope: &Envelope) -> Result<(), RelayError> {
        let payload: PulseDispatchPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(p) => p,
            Err(e) => {
                let mut span = pending_span(envelope, "relay.system.pulse");
                span.status = TraceStatus::Failed;
                span.error = Some(format!("invalid pulse payload: {e}"));
                if let Err(record_err) = self.core.index().record_span(&span) {
                    warn!(target: "relay.bridge", error = %record_err, "failed to record invalid-payload span");
                }
                return Ok(());
            }
        };

        let mut span = pending_span(envelope, &format!("relay.agent.{}", payload.run_id));
        if let Err(e) = self.core.index().record_span(&span) {
            warn!(target: "relay.bridge", error = %e, "failed to record pending pulse span");
        }

        if now_ms() > envelope.budget.ttl {
            self.finish_pulse_run(&mut span, &payload, PulseRunStatus::Cancelled, 0, String::new(), Some("Run timed out (TTL budget expired)".to_string()));
            return Ok(());
        }

        let started = Instant::now();
        let cwd = payload.cwd.clone().unwrap_or_else(|| self.default_cwd.clone());
        let permission_mode = payload.permission_mode;
        let prompt = payload.prompt.clone();
        let run_id = payload.run_id.clone();
        let ttl = envelope.budget.ttl;
        let creator = Arc::clone(&self.creator);

        let runtime = self.runtime.clone();
        let outcome = tokio::task::block_in_place(move || {
            runtime.block_on(async move {
                let session = creator.ensure_session(&run_id, &cwd, permission_mode).await?;
                let (tx, mut rx) = mpsc::channel::<StreamEvent>(32);
                let consumer = tokio::spawn(async move {
                    let mut summary = String::new();
                    let mut error: Option<String> = None;
                    let mut timed_out = false;
                    while let Some(event) = rx.recv().await {
                        if now_ms() > ttl {
                            timed_out = true;
                            break;
                        }
                        match event {
                            StreamEvent::Text { chunk } => summary = cap_summary(&format!("{summary}{chunk}")),
                            StreamEvent::Done { error: e } => error = e,
                            StreamEvent::ToolUse { .. } => {}
                        }
                    }
                    (summary, error, timed_out)
                });
                let send_result = session.send_message(prompt, tx).await;
                let (summary, event_error, timed_out) = consumer.await.unwrap_or_default();
                anyhow::Ok((send_result, summary, event_error, timed_out))
            })
        });

        let duration_ms = started.elapsed().as_millis() as i64;
        match outcome {
            Ok((send_result, summary, event_error, timed_out)) => {
                if timed_out {
                    self.finish_pulse_run(&mut span, &payload, PulseRunStatus::Cancelled, duration_ms, summary, Some("Run timed out (TTL budget expired)".to_string()));
                } else {
                    match (send_result, event_error) {
                        (Ok(()), None) => {
                            self.finish_pulse_run(&mut span, &payload, PulseRunStatus::Completed, duration_ms, summary, None);
                        }
                        (Ok(()), Some(e)) => {
                            self.finish_pulse_run(&mut span, &payload, PulseRunStatus::Failed, duration_ms, summary, Some(e));
                        }
                        (Err(e), _) => {
                            self.finish_pulse_run(&mut span, &payload, PulseRunStatus::Failed, duration_ms, summary, Some(e.to_string()));
                        }
                    }
                }
            }
            Err(e) => {
                self.finish_pulse_run(&mut span, &payload, PulseRunStatus::Failed, duration_ms, String::new(), Some(e.to_string()));
            }
        }
        Ok(())
    }

    fn finish_pulse_run(
        &self,
        span: &mut TraceSpan,
        payload: &PulseDispatchPayload,
        status: PulseRunStatus,
        duration_ms: i64,
        output_summary: String,
        error: Option<String>,
    ) {
        span.status = if status == PulseRunStatus::Completed {
            TraceStatus::Processed
        } else {
            TraceStatus::Failed
        };
        span.error = error.clone();
        span.processed_at = Some(Utc::now());
        if let Err(e) = self.core.index().record_span(span) {
            warn!(target: "relay.bridge", error = %e, "failed to record pulse outcome span");
        }

        let updater = Arc::clone(&self.updater);
        let run_id = payload.run_id.clone();
        let update = PulseRunUpdate {
            status,
            duration_ms,
            output_summary,
            error,
        };
        let runtime = self.runtime.clone();
        tokio::task::block_in_place(move || {
            runtime.block_on(async move {
                if let Err(e) = updater.update_run(&run_id, update).await {
                    warn!(target: "relay.bridge", run_id = %run_id, error = %e, "failed to report pulse run outcome");
                }
            });
        });
    }
}
