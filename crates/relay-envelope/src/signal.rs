// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ephemeral [`Signal`]s — never persisted, carry no ordering guarantees
//! relative to messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of ephemeral signal, with its type-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalKind {
    /// A participant is composing a reply.
    Typing {
        /// Whether typing started or stopped.
        state: bool,
    },
    /// A participant's online/offline state changed.
    Presence {
        /// Human-readable presence state (e.g. `"online"`, `"away"`).
        state: String,
    },
    /// A message was read by the recipient.
    Read {
        /// The message id that was read.
        message_id: String,
    },
    /// A message delivery outcome.
    Delivery {
        /// The message id.
        message_id: String,
        /// Whether delivery succeeded.
        delivered: bool,
    },
    /// Progress update for a long-running operation.
    Progress {
        /// Completion fraction in `[0.0, 1.0]`.
        fraction: f64,
        /// Optional human-readable detail.
        detail: Option<String>,
    },
    /// A mailbox is approaching or has hit its backpressure cap.
    Backpressure {
        /// Pressure fraction in `[0.0, 1.0]`.
        pressure: f64,
        /// Whether the mailbox has hit its hard cap (not just the warn band).
        rejected: bool,
    },
    /// A sender exceeded its rate limit and the publish was direct-failed.
    RateLimited {
        /// Message count observed within the current window.
        current: u32,
        /// The limit that was exceeded.
        limit: u32,
    },
}

/// An ephemeral, non-persistent event matching the subject/pattern grammar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// The subject this signal concerns (e.g. the affected endpoint).
    pub endpoint_subject: String,
    /// The signal payload.
    pub kind: SignalKind,
    /// When the signal was emitted.
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Construct a signal for `endpoint_subject` with the current time.
    #[must_use]
    pub fn new(endpoint_subject: impl Into<String>, kind: SignalKind) -> Self {
        Self {
            endpoint_subject: endpoint_subject.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}
