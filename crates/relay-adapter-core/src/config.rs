// SPDX-License-Identifier: MIT OR Apache-2.0
//! `adapters.json` persistence: one entry per configured adapter instance,
//! written atomically via `*.tmp` + rename.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AdapterError;

/// One configured adapter instance, as persisted in `adapters.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Unique id among all configured adapters.
    pub id: String,
    /// Adapter type discriminant, matching a registered manifest.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the adapter should be started.
    pub enabled: bool,
    /// Whether this instance ships with the core (cannot be removed).
    #[serde(default)]
    pub builtin: bool,
    /// Adapter-specific configuration, shaped per its manifest.
    pub config: serde_json::Value,
    /// For `type: "plugin"` adapters, the plugin path.
    #[serde(default)]
    pub plugin: Option<String>,
}

/// The on-disk shape of `adapters.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaptersFile {
    /// Every configured adapter instance.
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
}

/// Default config written when no `adapters.json` exists yet: the
/// built-in `claude-code` adapter, enabled.
#[must_use]
pub fn default_adapters_file() -> AdaptersFile {
    AdaptersFile {
        adapters: vec![AdapterConfig {
            id: "claude-code".to_string(),
            type_name: "claude-code".to_string(),
            enabled: true,
            builtin: true,
            config: serde_json::json!({}),
            plugin: None,
        }],
    }
}

/// Load `adapters.json` from `dir`. Missing or malformed files are
/// tolerated: a missing file yields the default config (not yet written);
/// a malformed file logs a warning and yields an empty config.
pub fn load(dir: &Path) -> AdaptersFile {
    let path = dir.join("adapters.json");
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return default_adapters_file();
    };
    match serde_json::from_str(&contents) {
        Ok(file) => file,
        Err(e) => {
            warn!(target: "relay.adapter", path = %path.display(), error = %e, "malformed adapters.json, treating as empty");
            AdaptersFile::default()
        }
    }
}

/// Write `file` to `dir/adapters.json` atomically (`*.tmp` then rename),
/// pretty-printed for diffability.
pub fn save(dir: &Path, file: &AdaptersFile) -> Result<(), AdapterError> {
    let path = dir.join("adapters.json");
    let tmp_path = dir.join("adapters.json.tmp");
    let json = serde_json::to_string_pretty(file).map_err(|e| AdapterError::Io(e.to_string()))?;
    std::fs::write(&tmp_path, json).map_err(|e| AdapterError::Io(e.to_string()))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| AdapterError::Io(e.to_string()))?;
    Ok(())
}
