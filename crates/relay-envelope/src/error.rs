// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable error catalog for the relay bus.
//!
//! Every error code follows the pattern `RELAY-X###` where `X` is the
//! category letter and `###` is a three-digit number:
//!
//! - **V** — Validation errors (bad subject, malformed pattern)
//! - **B** — Budget errors (hops, cycle, TTL, call budget)
//! - **M** — Maildir / delivery errors
//! - **X** — Index (SQLite) errors
//! - **R** — Reliability errors (rate limit, circuit, backpressure)
//! - **A** — Adapter / binding errors
//! - **C** — Configuration errors
//! - **S** — System errors

use serde::{Deserialize, Serialize};

/// Enumeration of all relay bus error codes, organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // ── Validation (V) ───────────────────────────────────────────────
    /// The subject or pattern string failed validation.
    InvalidSubject,
    /// A publish or subscribe call supplied a malformed pattern.
    InvalidPattern,
    /// A required field is missing or empty.
    MissingRequiredField,

    // ── Budget (B) ───────────────────────────────────────────────────
    /// `hopCount >= maxHops`.
    MaxHopsExceeded,
    /// The current endpoint already appears in the ancestor chain.
    CycleDetected,
    /// `now > ttl`.
    MessageExpired,
    /// `callBudgetRemaining <= 0`.
    CallBudgetExhausted,

    // ── Maildir (M) ──────────────────────────────────────────────────
    /// A claim (rename `new/ -> cur/`) lost the race to another claimer.
    ClaimFailed,
    /// The durable write to `tmp/` or the rename to `new/` failed.
    DeliveryFailed,
    /// A subscriber handler raised an error while processing a message.
    HandlerFailed,

    // ── Index (X) ────────────────────────────────────────────────────
    /// The SQLite index could not be opened or migrated.
    IndexUnavailable,
    /// A query against the index failed.
    IndexQueryFailed,

    // ── Reliability (R) ──────────────────────────────────────────────
    /// The sender exceeded its rate limit.
    RateLimited,
    /// The endpoint's circuit breaker is open.
    CircuitOpen,
    /// The endpoint mailbox is at or above its backpressure cap.
    MailboxFull,

    // ── Adapter / Binding (A) ──────────────────────────────────────────
    /// An adapter with the same id is already registered.
    DuplicateId,
    /// The requested adapter type is not known to the registry.
    UnknownType,
    /// The adapter's manifest forbids a second instance.
    MultiInstanceDenied,
    /// Removing a built-in adapter that may not be removed.
    RemoveBuiltinDenied,
    /// The requested id (adapter or binding) does not exist.
    NotFound,
    /// Access control denied the publish.
    AccessDenied,

    // ── Configuration (C) ────────────────────────────────────────────
    /// The configuration file could not be parsed.
    ConfigParseError,
    /// Configuration failed semantic validation.
    ConfigValidationError,

    // ── System (S) ───────────────────────────────────────────────────
    /// An I/O operation failed.
    IoError,
    /// JSON serialization or deserialization failed.
    SerializationError,
    /// An unexpected internal error occurred.
    InternalError,
}

impl ErrorCode {
    /// Machine-readable code string (e.g. `"RELAY-V001"`).
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSubject => "RELAY-V001",
            Self::InvalidPattern => "RELAY-V002",
            Self::MissingRequiredField => "RELAY-V003",

            Self::MaxHopsExceeded => "RELAY-B001",
            Self::CycleDetected => "RELAY-B002",
            Self::MessageExpired => "RELAY-B003",
            Self::CallBudgetExhausted => "RELAY-B004",

            Self::ClaimFailed => "RELAY-M001",
            Self::DeliveryFailed => "RELAY-M002",
            Self::HandlerFailed => "RELAY-M003",

            Self::IndexUnavailable => "RELAY-X001",
            Self::IndexQueryFailed => "RELAY-X002",

            Self::RateLimited => "RELAY-R001",
            Self::CircuitOpen => "RELAY-R002",
            Self::MailboxFull => "RELAY-R003",

            Self::DuplicateId => "RELAY-A001",
            Self::UnknownType => "RELAY-A002",
            Self::MultiInstanceDenied => "RELAY-A003",
            Self::RemoveBuiltinDenied => "RELAY-A004",
            Self::NotFound => "RELAY-A005",
            Self::AccessDenied => "RELAY-A006",

            Self::ConfigParseError => "RELAY-C001",
            Self::ConfigValidationError => "RELAY-C002",

            Self::IoError => "RELAY-S001",
            Self::SerializationError => "RELAY-S002",
            Self::InternalError => "RELAY-S003",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A relay bus error: a stable [`ErrorCode`] plus a human-readable message.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RelayError {
    /// Stable machine-readable code.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

impl RelayError {
    /// Build an error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(ErrorCode::MaxHopsExceeded.code(), "RELAY-B001");
        assert_eq!(ErrorCode::CycleDetected.code(), "RELAY-B002");
    }

    #[test]
    fn display_includes_message() {
        let e = RelayError::new(ErrorCode::NotFound, "binding abc not found");
        assert!(e.to_string().contains("RELAY-A005"));
        assert!(e.to_string().contains("binding abc not found"));
    }
}
