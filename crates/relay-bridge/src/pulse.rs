// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `relay.system.pulse.>` payload shape and the decoupled interface
//! for reporting a run's outcome back to the (out-of-scope) Pulse
//! scheduler.

use async_trait::async_trait;
use relay_agent_iface::PermissionMode;
use serde::{Deserialize, Serialize};

/// Bounded output summary length, per §4.8's "first 1000 chars".
pub const OUTPUT_SUMMARY_CAP: usize = 1000;

/// A dispatch request published by the (out-of-scope) Pulse scheduler on
/// `relay.system.pulse.<scheduleId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseDispatchPayload {
    /// The schedule this run was dispatched from.
    pub schedule_id: String,
    /// Unique identifier for this run; doubles as its agent session id.
    pub run_id: String,
    /// The prompt to send to a freshly started session.
    pub prompt: String,
    /// Working directory for the session. Falls back to a receiver-wide
    /// default when absent.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Permission mode for the session.
    #[serde(default)]
    pub permission_mode: PermissionMode,
}

/// Terminal outcome of a dispatched Pulse run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseRunStatus {
    /// The session finished handling the prompt without error.
    Completed,
    /// The session errored, or the agent runtime could not be reached.
    Failed,
    /// The TTL budget expired before the run completed.
    Cancelled,
}

/// The outcome record reported back to the external Pulse run tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseRunUpdate {
    /// Terminal status of the run.
    pub status: PulseRunStatus,
    /// Wall-clock duration of the dispatch, in milliseconds.
    pub duration_ms: i64,
    /// First [`OUTPUT_SUMMARY_CAP`] characters of textual output.
    pub output_summary: String,
    /// Error detail, if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where the receiver reports a Pulse run's outcome. Kept minimal and
/// decoupled from the scheduler itself, which is out of scope here — only
/// the receiver side of the interaction is implemented.
#[async_trait]
pub trait PulseRunUpdater: Send + Sync {
    /// Report `run_id`'s terminal outcome.
    async fn update_run(&self, run_id: &str, update: PulseRunUpdate) -> anyhow::Result<()>;
}

/// Truncate `summary` to [`OUTPUT_SUMMARY_CAP`] characters, respecting
/// UTF-8 boundaries.
#[must_use]
pub fn cap_summary(summary: &str) -> String {
    if summary.chars().count() <= OUTPUT_SUMMARY_CAP {
        return summary.to_string();
    }
    summary.chars().take(OUTPUT_SUMMARY_CAP).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_summary_leaves_short_text_untouched() {
        assert_eq!(cap_summary("hello"), "hello");
    }

    #[test]
    fn cap_summary_truncates_to_cap() {
        let long = "a".repeat(OUTPUT_SUMMARY_CAP + 50);
        assert_eq!(cap_summary(&long).chars().count(), OUTPUT_SUMMARY_CAP);
    }

    #[test]
    fn parses_minimal_payload_with_default_permission_mode() {
        let payload: PulseDispatchPayload = serde_json::from_value(serde_json::json!({
            "scheduleId": "sched-1",
            "runId": "run-1",
            "prompt": "do the thing",
        }))
        .unwrap();
        assert_eq!(payload.permission_mode, PermissionMode::default());
        assert!(payload.cwd.is_none());
    }
}
