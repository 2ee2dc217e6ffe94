// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The boundary between the relay bus and whatever agent runtime actually
//! drives sessions. The bus only needs to create sessions and stream
//! events in and out; it has no opinion on what runs inside a session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// How permissive a newly created session is about taking action without
/// confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Every action requires explicit confirmation.
    Confirm,
    /// The session may act within its project directory unprompted.
    Default,
    /// The session may act without restriction.
    Unrestricted,
}

impl Default for PermissionMode {
    fn default() -> Self {
        Self::Default
    }
}

/// A unit of streamed output from a running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental textual output.
    Text {
        /// The text chunk.
        chunk: String,
    },
    /// The session invoked a tool.
    ToolUse {
        /// Tool name.
        name: String,
        /// Tool input, opaque to the bus.
        input: serde_json::Value,
    },
    /// The session finished handling one message.
    Done {
        /// Whether the run ended in an error.
        error: Option<String>,
    },
}

/// A single running agent session.
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// This session's unique id.
    fn session_id(&self) -> &str;

    /// Send a message to the session, streaming back [`StreamEvent`]s on
    /// `events_tx` until the turn completes.
    async fn send_message(
        &self,
        content: String,
        events_tx: mpsc::Sender<StreamEvent>,
    ) -> anyhow::Result<()>;
}

/// Creates and looks up agent sessions. Implemented by the agent runtime;
/// consumed by the Binding Router and Message Receiver.
#[async_trait]
pub trait AgentSessionCreator: Send + Sync {
    /// Start a new session rooted at `cwd`, with the given permission mode.
    /// Returns the new session's id.
    async fn create_session(
        &self,
        cwd: &str,
        permission_mode: PermissionMode,
    ) -> anyhow::Result<String>;

    /// Look up a previously created session by id, if it still exists.
    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<std::sync::Arc<dyn AgentSession>>>;

    /// Ensure a session exists for `session_id`, creating one rooted at
    /// `cwd` with `permission_mode` if it does not.
    async fn ensure_session(
        &self,
        session_id: &str,
        cwd: &str,
        permission_mode: PermissionMode,
    ) -> anyhow::Result<std::sync::Arc<dyn AgentSession>>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock;
