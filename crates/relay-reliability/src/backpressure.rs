// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-endpoint mailbox backpressure.

use serde::{Deserialize, Serialize};

/// Backpressure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackpressureConfig {
    /// Whether the gate is active at all.
    pub enabled: bool,
    /// Hard cap on `new/` entries before deliveries are rejected.
    pub max_mailbox_size: u64,
    /// Pressure fraction (in `[0.0, 1.0]`) at which a warning signal fires.
    pub pressure_warning_at: f64,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_mailbox_size: 1_000,
            pressure_warning_at: 0.8,
        }
    }
}

/// Outcome of a backpressure check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackpressureDecision {
    /// Whether the delivery may proceed.
    pub allowed: bool,
    /// `min(current_size / max, 1.0)`.
    pub pressure: f64,
    /// Whether `pressure` has crossed the warning band (even if allowed).
    pub warn: bool,
}

/// Pure check over the endpoint's current `new/` count.
#[must_use]
pub fn check_backpressure(current_size: u64, config: &BackpressureConfig) -> BackpressureDecision {
    if !config.enabled {
        return BackpressureDecision {
            allowed: true,
            pressure: 0.0,
            warn: false,
        };
    }

    let max = config.max_mailbox_size.max(1) as f64;
    let pressure = (current_size as f64 / max).min(1.0);
    let allowed = current_size < config.max_mailbox_size;
    let warn = allowed && pressure >= config.pressure_warning_at;

    BackpressureDecision {
        allowed,
        pressure,
        warn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_always_allows() {
        let config = BackpressureConfig {
            enabled: false,
            ..Default::default()
        };
        let decision = check_backpressure(10_000, &config);
        assert!(decision.allowed);
        assert_eq!(decision.pressure, 0.0);
    }

    #[test]
    fn under_cap_allows_without_warning() {
        let config = BackpressureConfig {
            max_mailbox_size: 100,
            pressure_warning_at: 0.8,
            ..Default::default()
        };
        let decision = check_backpressure(10, &config);
        assert!(decision.allowed);
        assert!(!decision.warn);
    }

    #[test]
    fn warning_band_allows_but_warns() {
        let config = BackpressureConfig {
            max_mailbox_size: 10,
            pressure_warning_at: 0.8,
            ..Default::default()
        };
        let decision = check_backpressure(8, &config);
        assert!(decision.allowed);
        assert!(decision.warn);
        assert!((decision.pressure - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn at_cap_rejects() {
        let config = BackpressureConfig {
            max_mailbox_size: 3,
            ..Default::default()
        };
        let decision = check_backpressure(3, &config);
        assert!(!decision.allowed);
        assert!((decision.pressure - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pressure_never_exceeds_one() {
        let config = BackpressureConfig {
            max_mailbox_size: 3,
            ..Default::default()
        };
        let decision = check_backpressure(50, &config);
        assert_eq!(decision.pressure, 1.0);
        assert!(!decision.allowed);
    }
}
