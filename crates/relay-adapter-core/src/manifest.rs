// SPDX-License-Identifier: MIT OR Apache-2.0
//! Adapter manifests: static metadata describing an adapter type's
//! capabilities and configuration schema.

use serde::{Deserialize, Serialize};

/// The declared type of a single configuration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// Plain text.
    String,
    /// Numeric value.
    Number,
    /// True/false toggle.
    Boolean,
    /// A secret value, masked on read.
    Password,
    /// One of a fixed set of values.
    Enum {
        /// Allowed values.
        values: Vec<String>,
    },
}

/// One entry in an [`AdapterManifest`]'s configuration schema. `key` may
/// use dot-notation (`inbound.secret`) to address a nested field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    /// Dot-notation path into the adapter's config object.
    pub key: String,
    /// The field's declared type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must be present.
    #[serde(default)]
    pub required: bool,
}

impl ConfigField {
    /// Shorthand for a required password field.
    #[must_use]
    pub fn password(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field_type: FieldType::Password,
            required: true,
        }
    }

    /// Shorthand for a required string field.
    #[must_use]
    pub fn string(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field_type: FieldType::String,
            required: true,
        }
    }
}

/// Static metadata for one adapter type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterManifest {
    /// Adapter type discriminant (e.g. `"telegram"`).
    #[serde(rename = "type")]
    pub type_name: String,
    /// Human-readable name shown in UIs.
    pub display_name: String,
    /// Whether this type ships with the core and cannot be removed
    /// (only meaningful for the `claude-code` type per §4.8).
    pub builtin: bool,
    /// Whether more than one instance of this type may be configured.
    pub multi_instance: bool,
    /// Declared configuration schema.
    pub config_fields: Vec<ConfigField>,
}

impl AdapterManifest {
    /// Every password-typed field's dot-notation key.
    pub fn password_keys(&self) -> impl Iterator<Item = &str> {
        self.config_fields.iter().filter_map(|f| {
            if matches!(f.field_type, FieldType::Password) {
                Some(f.key.as_str())
            } else {
                None
            }
        })
    }
}
