// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration errors and advisory warnings.

/// Errors that can occur while loading or validating [`crate::RelayOptions`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },
    /// The file could not be parsed as TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse failure detail.
        reason: String,
    },
    /// Semantic validation failed.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// Advisory-level issues that do not prevent startup but deserve attention.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// A numeric field was clamped to its minimum allowed value.
    ClampedToMinimum {
        /// Name of the field.
        field: String,
        /// The value actually used.
        used: i64,
    },
    /// A rate-limit override references a prefix that looks like a full
    /// subject rather than a prefix (ends without a trailing segment).
    SuspiciousOverridePrefix {
        /// The prefix in question.
        prefix: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClampedToMinimum { field, used } => {
                write!(f, "field '{field}' clamped to minimum allowed value {used}")
            }
            Self::SuspiciousOverridePrefix { prefix } => {
                write!(f, "rate limit override prefix '{prefix}' looks like a full subject, not a prefix")
            }
        }
    }
}
