// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parses the adapter's persisted `config` object into a typed
//! [`TelegramConfig`].

use crate::error::TelegramError;

/// Parsed configuration for one Telegram bot instance.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// The bot API token, as issued by BotFather.
    pub bot_token: String,
    /// Chat ids allowed to reach this bot. Empty means no restriction,
    /// mirroring the allowlist-or-open-access shape in the reference
    /// Telegram handler this adapter is modeled on.
    pub allowed_chat_ids: Vec<i64>,
}

impl TelegramConfig {
    /// Parse `value`, returning [`TelegramError::MissingToken`] if
    /// `bot_token` is absent or blank and [`TelegramError::InvalidChatId`]
    /// if `allowed_chat_ids` contains a non-numeric entry.
    pub fn parse(value: &serde_json::Value) -> Result<Self, TelegramError> {
        let bot_token = value
            .get("bot_token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(TelegramError::MissingToken)?
            .to_string();

        let allowed_chat_ids = match value.get("allowed_chat_ids") {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<i64>().map_err(|_| TelegramError::InvalidChatId(s.to_string())))
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            bot_token,
            allowed_chat_ids,
        })
    }

    /// Whether `chat_id` may use this bot. An empty allowlist permits any
    /// chat, matching the "no restriction configured" default.
    #[must_use]
    pub fn allows(&self, chat_id: i64) -> bool {
        self.allowed_chat_ids.is_empty() || self.allowed_chat_ids.contains(&chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_rejected() {
        let err = TelegramConfig::parse(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, TelegramError::MissingToken));
    }

    #[test]
    fn parses_comma_separated_allowlist() {
        let cfg = TelegramConfig::parse(&serde_json::json!({
            "bot_token": "abc",
            "allowed_chat_ids": "123, 456",
        }))
        .unwrap();
        assert_eq!(cfg.allowed_chat_ids, vec![123, 456]);
        assert!(cfg.allows(123));
        assert!(!cfg.allows(789));
    }

    #[test]
    fn empty_allowlist_allows_any_chat() {
        let cfg = TelegramConfig::parse(&serde_json::json!({"bot_token": "abc"})).unwrap();
        assert!(cfg.allows(999));
    }

    #[test]
    fn rejects_non_numeric_chat_id() {
        let err = TelegramConfig::parse(&serde_json::json!({
            "bot_token": "abc",
            "allowed_chat_ids": "123,nope",
        }))
        .unwrap_err();
        assert!(matches!(err, TelegramError::InvalidChatId(_)));
    }
}
