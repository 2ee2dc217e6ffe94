// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Generic HTTP webhook adapter (§4.8 adapter translation): an inbound
//! listener on a configured port/path publishing to
//! `relay.human.webhook.<channel>`, and an outbound leg POSTing publishes
//! addressed back to that subject to a configured URL.

mod adapter;
mod config;
mod error;

pub use adapter::WebhookAdapter;
pub use config::WebhookConfig;
pub use error::WebhookError;

use std::sync::Arc;

use relay_adapter_core::{Adapter, AdapterManifest, ConfigField, FieldType};

/// The static manifest for the `webhook` adapter type. Multiple instances
/// are allowed, one per inbound source.
#[must_use]
pub fn manifest() -> AdapterManifest {
    AdapterManifest {
        type_name: "webhook".to_string(),
        display_name: "Webhook".to_string(),
        builtin: false,
        multi_instance: true,
        config_fields: vec![
            ConfigField::string("channel"),
            ConfigField {
                key: "listen_port".to_string(),
                field_type: FieldType::Number,
                required: true,
            },
            ConfigField {
                key: "path".to_string(),
                field_type: FieldType::String,
                required: false,
            },
            ConfigField {
                key: "outbound_url".to_string(),
                field_type: FieldType::String,
                required: false,
            },
            ConfigField {
                key: "auth_header".to_string(),
                field_type: FieldType::Password,
                required: false,
            },
        ],
    }
}

/// Build a [`WebhookAdapter`] from its persisted config object.
pub fn build(config: &serde_json::Value) -> anyhow::Result<Arc<dyn Adapter>> {
    let parsed = WebhookConfig::parse(config)?;
    Ok(Arc::new(WebhookAdapter::new(parsed)))
}
