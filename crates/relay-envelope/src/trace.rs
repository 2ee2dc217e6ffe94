// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`TraceSpan`] — a per-delivery row recording timing and outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single delivery attempt, tracked end-to-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// Recorded before persistence completes.
    Pending,
    /// Persisted to the endpoint mailbox.
    Delivered,
    /// Claimed and the subscriber handler completed successfully.
    Processed,
    /// Delivery or handling failed.
    Failed,
    /// Rejected pre-delivery and filed as a dead letter.
    DeadLettered,
}

/// A single delivery's trace record. Spans for one logical publish (fanned
/// out to multiple endpoints) share `trace_id` but have distinct `span_id`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    /// The per-delivery Maildir filename (matches [`crate::IndexedMessage::id`]).
    pub message_id: String,
    /// Shared id across all spans for one logical publish.
    pub trace_id: String,
    /// Id of this specific span.
    pub span_id: String,
    /// Id of the span that produced this one via a republish, if any.
    pub parent_span_id: Option<String>,
    /// Concrete subject delivered to.
    pub subject: String,
    /// Subject this delivery originated from (sender attribution).
    pub from_endpoint: String,
    /// Endpoint hash this delivery targets.
    pub to_endpoint: String,
    /// Current status.
    pub status: TraceStatus,
    /// `budget.hop_count` at the time this span was recorded.
    pub budget_hops_used: u32,
    /// Milliseconds remaining until `budget.ttl` at send time.
    pub budget_ttl_remaining_ms: i64,
    /// When the publish that produced this span occurred.
    pub sent_at: DateTime<Utc>,
    /// When the Maildir write completed.
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the subscriber handler completed successfully.
    pub processed_at: Option<DateTime<Utc>>,
    /// Error detail if `status` is `Failed` or `DeadLettered`.
    pub error: Option<String>,
}
