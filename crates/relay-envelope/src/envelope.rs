// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Envelope`] — the wire-and-disk unit of a single message delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::budget::Budget;

/// The durable unit of traffic routed by the relay bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// ULID, unique per envelope.
    pub id: String,
    /// Concrete subject at publication time.
    pub subject: String,
    /// Sender subject, for attribution, access control, and rate limiting.
    pub from: String,
    /// Optional subject for responses.
    #[serde(default, rename = "replyTo", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Arbitrary JSON-serializable payload.
    pub payload: serde_json::Value,
    /// ISO-8601 creation timestamp.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Resource allowances carried with this envelope.
    pub budget: Budget,
}

impl Envelope {
    /// Construct a new envelope with a freshly generated ULID id and the
    /// given budget (typically [`Budget::fresh`] unless the caller supplied
    /// an override).
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        from: impl Into<String>,
        reply_to: Option<String>,
        payload: serde_json::Value,
        budget: Budget,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            subject: subject.into(),
            from: from.into(),
            reply_to,
            payload,
            created_at: Utc::now(),
            budget,
        }
    }

    /// Return a copy of this envelope carrying `budget` instead, used after
    /// a successful [`crate::budget::enforce`] call for a given endpoint.
    #[must_use]
    pub fn with_budget(&self, budget: Budget) -> Self {
        Self {
            budget,
            ..self.clone()
        }
    }

    /// Extract textual content from the payload for display/forwarding
    /// purposes. Never panics: strings are used directly, objects prefer a
    /// `content` field then a `text` field, and anything else is
    /// JSON-stringified.
    #[must_use]
    pub fn payload_text(&self) -> String {
        match &self.payload {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map
                .get("content")
                .and_then(|v| v.as_str())
                .or_else(|| map.get("text").and_then(|v| v.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| self.payload.to_string()),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_text_string() {
        let e = Envelope::new("s", "f", None, serde_json::json!("hello"), Budget::fresh());
        assert_eq!(e.payload_text(), "hello");
    }

    #[test]
    fn payload_text_object_content() {
        let e = Envelope::new(
            "s",
            "f",
            None,
            serde_json::json!({"content": "hi"}),
            Budget::fresh(),
        );
        assert_eq!(e.payload_text(), "hi");
    }

    #[test]
    fn payload_text_object_text_fallback() {
        let e = Envelope::new(
            "s",
            "f",
            None,
            serde_json::json!({"text": "yo"}),
            Budget::fresh(),
        );
        assert_eq!(e.payload_text(), "yo");
    }

    #[test]
    fn payload_text_other_stringifies() {
        let e = Envelope::new("s", "f", None, serde_json::json!(42), Budget::fresh());
        assert_eq!(e.payload_text(), "42");
    }

    #[test]
    fn with_budget_preserves_other_fields() {
        let e = Envelope::new("s", "f", None, serde_json::json!("x"), Budget::fresh());
        let mut new_budget = e.budget.clone();
        new_budget.hop_count += 1;
        let e2 = e.with_budget(new_budget.clone());
        assert_eq!(e2.id, e.id);
        assert_eq!(e2.subject, e.subject);
        assert_eq!(e2.budget, new_budget);
    }
}
