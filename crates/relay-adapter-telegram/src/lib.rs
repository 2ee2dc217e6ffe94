// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Telegram bot adapter (§4.8 adapter translation, modeled on the reference
//! bot handler's allowlist-then-dispatch shape): subscribes to the Bot API
//! for one bot token and translates chat messages to and from
//! `relay.human.telegram.<chatId>` publishes.

mod adapter;
mod config;
mod error;

pub use adapter::TelegramAdapter;
pub use config::TelegramConfig;
pub use error::TelegramError;

use std::sync::Arc;

use relay_adapter_core::{Adapter, AdapterManifest, ConfigField};

/// The static manifest for the `telegram` adapter type. A single bot token
/// is expected per deployment; register under one fixed id.
#[must_use]
pub fn manifest() -> AdapterManifest {
    AdapterManifest {
        type_name: "telegram".to_string(),
        display_name: "Telegram".to_string(),
        builtin: false,
        multi_instance: false,
        config_fields: vec![
            ConfigField::password("bot_token"),
            ConfigField {
                key: "allowed_chat_ids".to_string(),
                field_type: relay_adapter_core::FieldType::String,
                required: false,
            },
        ],
    }
}

/// Build a [`TelegramAdapter`] from its persisted config object.
pub fn build(config: &serde_json::Value) -> anyhow::Result<Arc<dyn Adapter>> {
    let parsed = TelegramConfig::parse(config)?;
    Ok(Arc::new(TelegramAdapter::new(parsed)))
}
