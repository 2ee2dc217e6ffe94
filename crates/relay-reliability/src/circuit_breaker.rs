// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-endpoint circuit breaker state machine.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Whether the gate is active at all.
    pub enabled: bool,
    /// Consecutive failures before tripping CLOSED -> OPEN.
    pub failure_threshold: u32,
    /// Time an endpoint stays OPEN before a HALF_OPEN probe is allowed.
    pub cooldown_ms: i64,
    /// Reserved for future multi-probe support; currently always 1 probe.
    pub half_open_probe_count: u32,
    /// Consecutive HALF_OPEN successes required to close.
    pub success_to_close: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            cooldown_ms: 30_000,
            half_open_probe_count: 1,
            success_to_close: 2,
        }
    }
}

/// The three-state breaker cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Traffic flows normally.
    Closed,
    /// Traffic is refused until the cooldown elapses.
    Open,
    /// A single probe is allowed through to test recovery.
    HalfOpen,
}

#[derive(Debug, Clone)]
struct EndpointState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<i64>,
    half_open_successes: u32,
}

impl Default for EndpointState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_successes: 0,
        }
    }
}

/// Per-endpoint breaker registry. Interior mutability lets it sit behind a
/// shared reference in the core pipeline.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    endpoints: Mutex<HashMap<String, EndpointState>>,
}

impl CircuitBreaker {
    /// Construct a breaker registry with the given configuration.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Returns whether a delivery to `endpoint_hash` may proceed at `now_ms`,
    /// transitioning OPEN -> HALF_OPEN in place once the cooldown elapses.
    pub fn check(&self, endpoint_hash: &str, now_ms: i64) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut endpoints = self.endpoints.lock().expect("breaker mutex poisoned");
        let entry = endpoints.entry(endpoint_hash.to_string()).or_default();

        match entry.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = entry.opened_at.unwrap_or(now_ms);
                if now_ms - opened_at >= self.config.cooldown_ms {
                    entry.state = CircuitState::HalfOpen;
                    entry.half_open_successes = 0;
                    debug!(target: "relay.reliability", endpoint_hash, "circuit half-open probe allowed");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful delivery/handler run for `endpoint_hash`.
    pub fn record_success(&self, endpoint_hash: &str) {
        if !self.config.enabled {
            return;
        }
        let mut endpoints = self.endpoints.lock().expect("breaker mutex poisoned");
        let entry = endpoints.entry(endpoint_hash.to_string()).or_default();

        match entry.state {
            CircuitState::Closed => {
                entry.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                entry.half_open_successes += 1;
                if entry.half_open_successes >= self.config.success_to_close {
                    entry.state = CircuitState::Closed;
                    entry.consecutive_failures = 0;
                    entry.opened_at = None;
                    entry.half_open_successes = 0;
                    debug!(target: "relay.reliability", endpoint_hash, "circuit closed after successful probes");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed delivery/handler run for `endpoint_hash`, tripping
    /// the breaker open if warranted.
    pub fn record_failure(&self, endpoint_hash: &str, now_ms: i64) {
        if !self.config.enabled {
            return;
        }
        let mut endpoints = self.endpoints.lock().expect("breaker mutex poisoned");
        let entry = endpoints.entry(endpoint_hash.to_string()).or_default();

        match entry.state {
            CircuitState::Closed => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= self.config.failure_threshold {
                    entry.state = CircuitState::Open;
                    entry.opened_at = Some(now_ms);
                    warn!(target: "relay.reliability", endpoint_hash, "circuit opened");
                }
            }
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
                entry.opened_at = Some(now_ms);
                entry.half_open_successes = 0;
                warn!(target: "relay.reliability", endpoint_hash, "circuit reopened after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    /// Drop all state for `endpoint_hash`, returning it to CLOSED lazily.
    pub fn reset(&self, endpoint_hash: &str) {
        let mut endpoints = self.endpoints.lock().expect("breaker mutex poisoned");
        endpoints.remove(endpoint_hash);
    }

    /// Current state for `endpoint_hash` (CLOSED if never seen).
    #[must_use]
    pub fn state(&self, endpoint_hash: &str) -> CircuitState {
        let endpoints = self.endpoints.lock().expect("breaker mutex poisoned");
        endpoints
            .get(endpoint_hash)
            .map(|e| e.state)
            .unwrap_or(CircuitState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            enabled: true,
            failure_threshold: 3,
            cooldown_ms: 1_000,
            half_open_probe_count: 1,
            success_to_close: 2,
        })
    }

    #[test]
    fn starts_closed_and_allows() {
        let b = breaker();
        assert!(b.check("ep", 0));
        assert_eq!(b.state("ep"), CircuitState::Closed);
    }

    #[test]
    fn trips_open_after_failure_threshold() {
        let b = breaker();
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        assert_eq!(b.state("ep"), CircuitState::Closed);
        b.record_failure("ep", 0);
        assert_eq!(b.state("ep"), CircuitState::Open);
        assert!(!b.check("ep", 0));
    }

    #[test]
    fn success_resets_consecutive_failures_while_closed() {
        let b = breaker();
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        b.record_success("ep");
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        assert_eq!(b.state("ep"), CircuitState::Closed);
    }

    #[test]
    fn open_transitions_to_half_open_after_cooldown() {
        let b = breaker();
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        assert!(!b.check("ep", 500));
        assert!(b.check("ep", 1_000));
        assert_eq!(b.state("ep"), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_success_to_close_successes() {
        let b = breaker();
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        b.check("ep", 1_000);
        b.record_success("ep");
        assert_eq!(b.state("ep"), CircuitState::HalfOpen);
        b.record_success("ep");
        assert_eq!(b.state("ep"), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let b = breaker();
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        b.check("ep", 1_000);
        b.record_failure("ep", 1_000);
        assert_eq!(b.state("ep"), CircuitState::Open);
        assert!(!b.check("ep", 1_500));
    }

    #[test]
    fn reset_returns_to_closed() {
        let b = breaker();
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        b.record_failure("ep", 0);
        assert_eq!(b.state("ep"), CircuitState::Open);
        b.reset("ep");
        assert_eq!(b.state("ep"), CircuitState::Closed);
    }

    #[test]
    fn disabled_always_allows() {
        let b = CircuitBreaker::new(CircuitBreakerConfig {
            enabled: false,
            ..CircuitBreakerConfig::default()
        });
        for _ in 0..10 {
            b.record_failure("ep", 0);
        }
        assert!(b.check("ep", 0));
    }
}
