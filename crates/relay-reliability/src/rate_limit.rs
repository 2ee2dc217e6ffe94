// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-sender sliding-window rate limiting.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether the gate is active at all.
    pub enabled: bool,
    /// Sliding window width in seconds.
    pub window_secs: u64,
    /// Default max messages per window for senders with no override.
    pub max_per_window: u32,
    /// Subject-prefix overrides; the longest matching prefix wins.
    pub per_sender_overrides: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_per_window: 120,
            per_sender_overrides: HashMap::new(),
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the sender may proceed.
    pub allowed: bool,
    /// The count the decision was computed against.
    pub current_count: Option<u32>,
    /// The limit applied (the override or the default).
    pub limit: Option<u32>,
    /// Human-readable reason when `allowed` is false.
    pub reason: Option<String>,
}

fn resolve_limit(sender: &str, config: &RateLimitConfig) -> u32 {
    config
        .per_sender_overrides
        .iter()
        .filter(|(prefix, _)| sender.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, limit)| *limit)
        .unwrap_or(config.max_per_window)
}

/// Pure check: the caller supplies `count_in_window`, the number of
/// messages `sender` has authored within the current sliding window
/// (typically derived from the SQLite index).
#[must_use]
pub fn check_rate_limit(
    sender: &str,
    count_in_window: u32,
    config: &RateLimitConfig,
) -> RateLimitDecision {
    if !config.enabled {
        return RateLimitDecision {
            allowed: true,
            current_count: None,
            limit: None,
            reason: None,
        };
    }

    let limit = resolve_limit(sender, config);
    if count_in_window >= limit {
        return RateLimitDecision {
            allowed: false,
            current_count: Some(count_in_window),
            limit: Some(limit),
            reason: Some(format!(
                "sender {sender} exceeded {limit} messages in the current window"
            )),
        };
    }

    RateLimitDecision {
        allowed: true,
        current_count: Some(count_in_window),
        limit: Some(limit),
        reason: None,
    }
}
