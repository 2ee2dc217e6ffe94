// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loading [`RelayOptions`] from TOML files or strings.

use std::path::Path;

use tracing::warn;

use crate::error::{ConfigError, ConfigWarning};
use crate::options::{RelayOptions, ResolvedOptions};

/// Parse `contents` as TOML into [`RelayOptions`] and resolve defaults.
pub fn load_from_str(contents: &str) -> Result<(ResolvedOptions, Vec<ConfigWarning>), ConfigError> {
    let options: RelayOptions = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })?;
    Ok(options.resolve())
}

/// Read and parse `path`. A missing file is treated as an empty
/// configuration (all defaults), with a warning logged rather than an
/// error, mirroring how the adapter manager tolerates a missing manifest.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<(ResolvedOptions, Vec<ConfigWarning>), ConfigError> {
    let path = path.as_ref();
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(target: "relay.config", path = %path.display(), "config file missing, using defaults");
            String::new()
        }
        Err(e) => {
            return Err(ConfigError::FileNotFound {
                path: format!("{}: {e}", path.display()),
            })
        }
    };
    load_from_str(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_resolves_to_defaults() {
        let (resolved, warnings) = load_from_str("").unwrap();
        assert_eq!(resolved.max_hops, relay_envelope::budget::DEFAULT_MAX_HOPS);
        assert!(warnings.is_empty());
    }

    #[test]
    fn parses_top_level_and_nested_overrides() {
        let toml = r#"
            max_hops = 3
            default_ttl_ms = 10000

            [reliability.rate_limit]
            max_per_window = 50

            [reliability.circuit_breaker]
            failure_threshold = 2
        "#;
        let (resolved, _) = load_from_str(toml).unwrap();
        assert_eq!(resolved.max_hops, 3);
        assert_eq!(resolved.default_ttl_ms, 10_000);
        assert_eq!(resolved.rate_limit.max_per_window, 50);
        assert_eq!(resolved.circuit_breaker.failure_threshold, 2);
        assert!(resolved.backpressure.enabled);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = load_from_str("bogus_field = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let (resolved, _) = load_from_path("/nonexistent/path/relay.toml").unwrap();
        assert_eq!(resolved.max_hops, relay_envelope::budget::DEFAULT_MAX_HOPS);
    }

    #[test]
    fn loads_from_real_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "max_hops = 7\n").unwrap();
        let (resolved, _) = load_from_path(&path).unwrap();
        assert_eq!(resolved.max_hops, 7);
    }
}
