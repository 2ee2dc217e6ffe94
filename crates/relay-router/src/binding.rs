// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Binding`] record mapping an adapter/chat/channel tuple to an
//! agent session strategy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a binding's inbound messages are grouped into agent sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStrategy {
    /// One session per distinct chat.
    PerChat,
    /// One session per distinct channel type.
    PerChannel,
    /// One session for every message the binding matches.
    Shared,
}

impl Default for SessionStrategy {
    fn default() -> Self {
        Self::PerChat
    }
}

/// Maps `(adapterId, chatId?, channelType?)` to `(agentId, projectPath,
/// sessionStrategy, label)`. Persisted as one entry in `bindings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// UUID, assigned on creation.
    pub id: String,
    /// The adapter instance this binding routes for.
    pub adapter_id: String,
    /// The agent identifier a resolved session is created under.
    pub agent_id: String,
    /// Working directory new sessions are rooted at.
    pub project_path: String,
    /// How inbound messages are grouped into sessions.
    #[serde(default)]
    pub session_strategy: SessionStrategy,
    /// Free-text label, defaults to empty.
    #[serde(default)]
    pub label: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
    /// Exact chat id to match, if this binding is chat-specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Exact channel type to match, if this binding is channel-specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
}

/// Fields accepted by [`crate::store::BindingStore::create`].
#[derive(Debug, Clone, Default)]
pub struct NewBinding {
    /// The adapter instance this binding routes for.
    pub adapter_id: String,
    /// The agent identifier a resolved session is created under.
    pub agent_id: String,
    /// Working directory new sessions are rooted at.
    pub project_path: String,
    /// How inbound messages are grouped into sessions. Defaults to
    /// [`SessionStrategy::PerChat`] if left unset.
    pub session_strategy: Option<SessionStrategy>,
    /// Free-text label, defaults to empty.
    pub label: Option<String>,
    /// Exact chat id to match, if this binding is chat-specific.
    pub chat_id: Option<String>,
    /// Exact channel type to match, if this binding is channel-specific.
    pub channel_type: Option<String>,
}

/// A sparse set of fields to apply to an existing binding via
/// [`crate::store::BindingStore::update`]. `None` leaves a field
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct BindingPatch {
    /// New agent identifier, if changing.
    pub agent_id: Option<String>,
    /// New project path, if changing.
    pub project_path: Option<String>,
    /// New session strategy, if changing.
    pub session_strategy: Option<SessionStrategy>,
    /// New label, if changing.
    pub label: Option<String>,
    /// New chat id, if changing (`Some(None)` clears it).
    pub chat_id: Option<Option<String>>,
    /// New channel type, if changing (`Some(None)` clears it).
    pub channel_type: Option<Option<String>>,
}

/// Score a binding against an inbound `(chatId?, channelType?)` pair per
/// §4.8's resolve algorithm. Returns `None` if disqualified by an explicit
/// mismatch on either attribute.
#[must_use]
pub fn score(binding: &Binding, chat_id: Option<&str>, channel_type: Option<&str>) -> Option<u8> {
    let chat_match = match (&binding.chat_id, chat_id) {
        (Some(b), Some(c)) if b == c => Some(true),
        (Some(_), Some(_)) => None, // explicit mismatch: disqualified
        (Some(_), None) => None,    // binding requires a chat id the message lacks: disqualified
        (None, Some(_)) => Some(false),
        (None, None) => Some(false),
    };
    let chat_match = chat_match?;

    let channel_match = match (&binding.channel_type, channel_type) {
        (Some(b), Some(c)) if b == c => Some(true),
        (Some(_), Some(_)) => None,
        (Some(_), None) => None,
        (None, Some(_)) => Some(false),
        (None, None) => Some(false),
    };
    let channel_match = channel_match?;

    Some(match (chat_match, channel_match) {
        (true, true) => 7,
        (true, false) => 5,
        (false, true) => 3,
        (false, false) => 1,
    })
}
