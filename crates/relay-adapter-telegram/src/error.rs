// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors specific to the Telegram adapter.

/// Failure modes distinct to Telegram bot setup and message translation.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// `bot_token` was missing or empty in the adapter's config.
    #[error("telegram adapter config is missing bot_token")]
    MissingToken,
    /// `allowed_chat_ids` contained a value that did not parse as an i64.
    #[error("invalid chat id in allowed_chat_ids: {0}")]
    InvalidChatId(String),
    /// The bot API rejected a call.
    #[error("telegram API error: {0}")]
    Api(String),
}
