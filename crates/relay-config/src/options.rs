// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`RelayOptions`] — the partial, TOML-loadable override of relay defaults,
//! and its [`ResolvedOptions`] with every field filled in.

use std::collections::HashMap;
use std::path::PathBuf;

use relay_envelope::budget::{DEFAULT_CALL_BUDGET, DEFAULT_MAX_HOPS, DEFAULT_TTL_MS};
use relay_reliability::{BackpressureConfig, CircuitBreakerConfig, RateLimitConfig};
use serde::Deserialize;

use crate::error::ConfigWarning;

/// User-facing, partial configuration. Every field is optional; absent
/// fields fall back to the corresponding default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RelayOptions {
    /// Root directory for `mailboxes/`, `index.db`, and the JSON stores.
    pub data_dir: Option<PathBuf>,
    /// Override for [`relay_envelope::budget::DEFAULT_MAX_HOPS`].
    pub max_hops: Option<u32>,
    /// Override for [`relay_envelope::budget::DEFAULT_TTL_MS`], in milliseconds.
    pub default_ttl_ms: Option<i64>,
    /// Override for [`relay_envelope::budget::DEFAULT_CALL_BUDGET`].
    pub default_call_budget: Option<u32>,
    /// Capacity of the delivery pipeline's `recentlyDispatched` FIFO set.
    pub recently_dispatched_cap: Option<usize>,
    /// Whether access control denies by default when no rule matches.
    /// Defaults to `false` (allow) — this is a local, trusted-host bus.
    pub access_control_default_deny: Option<bool>,
    /// Reliability layer overrides.
    pub reliability: ReliabilityOptions,
}

/// Partial overrides for the three reliability gates.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReliabilityOptions {
    /// Rate limiter overrides.
    pub rate_limit: RateLimitOptions,
    /// Circuit breaker overrides.
    pub circuit_breaker: CircuitBreakerOptions,
    /// Backpressure overrides.
    pub backpressure: BackpressureOptions,
}

/// Partial rate limit overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RateLimitOptions {
    /// See [`RateLimitConfig::enabled`].
    pub enabled: Option<bool>,
    /// See [`RateLimitConfig::window_secs`].
    pub window_secs: Option<u64>,
    /// See [`RateLimitConfig::max_per_window`].
    pub max_per_window: Option<u32>,
    /// See [`RateLimitConfig::per_sender_overrides`].
    pub per_sender_overrides: HashMap<String, u32>,
}

/// Partial circuit breaker overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CircuitBreakerOptions {
    /// See [`CircuitBreakerConfig::enabled`].
    pub enabled: Option<bool>,
    /// See [`CircuitBreakerConfig::failure_threshold`].
    pub failure_threshold: Option<u32>,
    /// See [`CircuitBreakerConfig::cooldown_ms`].
    pub cooldown_ms: Option<i64>,
    /// See [`CircuitBreakerConfig::success_to_close`].
    pub success_to_close: Option<u32>,
}

/// Partial backpressure overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BackpressureOptions {
    /// See [`BackpressureConfig::enabled`].
    pub enabled: Option<bool>,
    /// See [`BackpressureConfig::max_mailbox_size`].
    pub max_mailbox_size: Option<u64>,
    /// See [`BackpressureConfig::pressure_warning_at`].
    pub pressure_warning_at: Option<f64>,
}

/// Every relay option with defaults applied, ready for the runtime to
/// consume directly.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    /// Root directory for all on-disk state.
    pub data_dir: PathBuf,
    /// Maximum hop count before a publish is rejected.
    pub max_hops: u32,
    /// Default TTL, in milliseconds, applied to a fresh budget.
    pub default_ttl_ms: i64,
    /// Default call budget applied to a fresh budget.
    pub default_call_budget: u32,
    /// Capacity of the delivery pipeline's `recentlyDispatched` FIFO set.
    pub recently_dispatched_cap: usize,
    /// Whether access control denies by default when no rule matches.
    pub access_control_default_deny: bool,
    /// Resolved rate limiter configuration.
    pub rate_limit: RateLimitConfig,
    /// Resolved circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Resolved backpressure configuration.
    pub backpressure: BackpressureConfig,
}

impl RelayOptions {
    /// Apply defaults to every absent field, collecting advisory warnings
    /// for values that needed clamping.
    #[must_use]
    pub fn resolve(&self) -> (ResolvedOptions, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();

        let max_hops = self.max_hops.unwrap_or(DEFAULT_MAX_HOPS);
        let default_ttl_ms = self.default_ttl_ms.unwrap_or(DEFAULT_TTL_MS);
        let default_call_budget = self.default_call_budget.unwrap_or(DEFAULT_CALL_BUDGET);

        let rl = &self.reliability.rate_limit;
        let rate_limit = RateLimitConfig {
            enabled: rl.enabled.unwrap_or(true),
            window_secs: rl.window_secs.unwrap_or(60),
            max_per_window: rl.max_per_window.unwrap_or(120),
            per_sender_overrides: rl.per_sender_overrides.clone(),
        };
        for prefix in rate_limit.per_sender_overrides.keys() {
            if prefix.matches('.').count() >= 3 {
                warnings.push(ConfigWarning::SuspiciousOverridePrefix {
                    prefix: prefix.clone(),
                });
            }
        }

        let cb = &self.reliability.circuit_breaker;
        let mut failure_threshold = cb.failure_threshold.unwrap_or(5);
        if failure_threshold == 0 {
            warnings.push(ConfigWarning::ClampedToMinimum {
                field: "reliability.circuit_breaker.failure_threshold".to_string(),
                used: 1,
            });
            failure_threshold = 1;
        }
        let circuit_breaker = CircuitBreakerConfig {
            enabled: cb.enabled.unwrap_or(true),
            failure_threshold,
            cooldown_ms: cb.cooldown_ms.unwrap_or(30_000),
            half_open_probe_count: 1,
            success_to_close: cb.success_to_close.unwrap_or(2),
        };

        let bp = &self.reliability.backpressure;
        let mut max_mailbox_size = bp.max_mailbox_size.unwrap_or(1_000);
        if max_mailbox_size == 0 {
            warnings.push(ConfigWarning::ClampedToMinimum {
                field: "reliability.backpressure.max_mailbox_size".to_string(),
                used: 1,
            });
            max_mailbox_size = 1;
        }
        let backpressure = BackpressureConfig {
            enabled: bp.enabled.unwrap_or(true),
            max_mailbox_size,
            pressure_warning_at: bp.pressure_warning_at.unwrap_or(0.8),
        };

        let resolved = ResolvedOptions {
            data_dir: self
                .data_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("./relay-data")),
            max_hops,
            default_ttl_ms,
            default_call_budget,
            recently_dispatched_cap: self.recently_dispatched_cap.unwrap_or(10_000),
            access_control_default_deny: self.access_control_default_deny.unwrap_or(false),
            rate_limit,
            circuit_breaker,
            backpressure,
        };

        (resolved, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_resolve_to_documented_defaults() {
        let (resolved, warnings) = RelayOptions::default().resolve();
        assert_eq!(resolved.max_hops, DEFAULT_MAX_HOPS);
        assert_eq!(resolved.default_ttl_ms, DEFAULT_TTL_MS);
        assert_eq!(resolved.default_call_budget, DEFAULT_CALL_BUDGET);
        assert!(resolved.rate_limit.enabled);
        assert!(warnings.is_empty());
    }

    #[test]
    fn partial_override_only_touches_named_fields() {
        let options = RelayOptions {
            max_hops: Some(9),
            ..Default::default()
        };
        let (resolved, _) = options.resolve();
        assert_eq!(resolved.max_hops, 9);
        assert_eq!(resolved.default_ttl_ms, DEFAULT_TTL_MS);
    }

    #[test]
    fn zero_failure_threshold_is_clamped_with_warning() {
        let mut options = RelayOptions::default();
        options.reliability.circuit_breaker.failure_threshold = Some(0);
        let (resolved, warnings) = options.resolve();
        assert_eq!(resolved.circuit_breaker.failure_threshold, 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn per_sender_overrides_pass_through() {
        let mut options = RelayOptions::default();
        options
            .reliability
            .rate_limit
            .per_sender_overrides
            .insert("relay.human.telegram".to_string(), 10);
        let (resolved, _) = options.resolve();
        assert_eq!(
            resolved.rate_limit.per_sender_overrides.get("relay.human.telegram"),
            Some(&10)
        );
    }
}
