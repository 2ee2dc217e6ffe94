// SPDX-License-Identifier: MIT OR Apache-2.0
//! Types derived from the Maildir filesystem for indexing and dead-lettering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

/// Lifecycle status of an indexed message, mirroring its Maildir directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Delivered but not yet claimed (`new/`).
    New,
    /// Claimed and being processed (`cur/`).
    Cur,
    /// Processing failed or was rejected pre-delivery (`failed/`).
    Failed,
    /// Claimed and successfully processed (unlinked from disk, index-only).
    Processed,
}

impl MessageStatus {
    /// Parse from the Maildir subdirectory name (`new`, `cur`, `failed`).
    #[must_use]
    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "new" => Some(Self::New),
            "cur" => Some(Self::Cur),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A message record derived from a Maildir filename plus the envelope it
/// names, as stored in the SQLite index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedMessage {
    /// Row id: the per-delivery Maildir filename stem (not `envelope.id`,
    /// since fan-out creates one filename per endpoint).
    pub id: String,
    /// Concrete subject.
    pub subject: String,
    /// Sender subject.
    pub sender: String,
    /// Hash of the endpoint this delivery belongs to.
    pub endpoint_hash: String,
    /// Current lifecycle status.
    pub status: MessageStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Epoch-millisecond TTL deadline.
    pub ttl: i64,
}

/// A rejected or failed envelope retained under `failed/` with a sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The envelope that was rejected or failed.
    pub envelope: Envelope,
    /// Why it was dead-lettered.
    pub reason: String,
    /// When it was dead-lettered.
    pub failed_at: DateTime<Utc>,
    /// Hash of the endpoint the dead letter is filed under.
    pub endpoint_hash: String,
}
