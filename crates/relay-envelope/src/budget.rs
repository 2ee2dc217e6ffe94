// SPDX-License-Identifier: MIT OR Apache-2.0
//! Budget enforcement (C2) — a pure function bounding cascading traffic.
//!
//! Budgets only ever shrink as an envelope propagates: `hopCount` increases,
//! `callBudgetRemaining` decreases, and the ancestor chain only grows.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ErrorCode, RelayError};

/// Default maximum hop count for a freshly constructed budget.
pub const DEFAULT_MAX_HOPS: u32 = 5;
/// Default time-to-live for a freshly constructed budget: one hour.
pub const DEFAULT_TTL_MS: i64 = 3_600_000;
/// Default call-budget allowance for a freshly constructed budget.
pub const DEFAULT_CALL_BUDGET: u32 = 10;

/// Resource allowances carried by every [`crate::Envelope`], shrinking on
/// each successful hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Number of endpoints this envelope has already been delivered through.
    pub hop_count: u32,
    /// Maximum permitted `hop_count`.
    pub max_hops: u32,
    /// Endpoint hashes this envelope has already visited, in order.
    pub ancestor_chain: Vec<String>,
    /// Epoch-millisecond deadline after which the envelope is expired.
    pub ttl: i64,
    /// Remaining number of deliveries this envelope may still make.
    pub call_budget_remaining: u32,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            hop_count: 0,
            max_hops: DEFAULT_MAX_HOPS,
            ancestor_chain: Vec::new(),
            ttl: now_ms() + DEFAULT_TTL_MS,
            call_budget_remaining: DEFAULT_CALL_BUDGET,
        }
    }
}

impl Budget {
    /// Construct a fresh budget with the library defaults.
    #[must_use]
    pub fn fresh() -> Self {
        Self::default()
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Result of [`enforce`] when the budget permits delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    /// The updated budget to attach to the delivered envelope copy.
    pub updated_budget: Budget,
}

/// Check a budget against delivery to `current_endpoint`, in the order the
/// spec mandates: hops, then cycle, then TTL, then call budget. Returns the
/// first failure encountered, or the updated (shrunk) budget on success.
///
/// This is a pure function of its inputs plus wall-clock time; it never
/// mutates its arguments and never panics.
#[must_use]
pub fn enforce(budget: &Budget, current_endpoint: &str, now_ms_override: Option<i64>) -> Result<Admitted, RelayError> {
    if budget.hop_count >= budget.max_hops {
        return Err(RelayError::new(
            ErrorCode::MaxHopsExceeded,
            format!(
                "hop count {} reached max hops {}",
                budget.hop_count, budget.max_hops
            ),
        ));
    }

    if budget
        .ancestor_chain
        .iter()
        .any(|a| a == current_endpoint)
    {
        return Err(RelayError::new(
            ErrorCode::CycleDetected,
            format!("endpoint {current_endpoint} already in ancestor chain"),
        ));
    }

    let now = now_ms_override.unwrap_or_else(now_ms);
    if now > budget.ttl {
        return Err(RelayError::new(
            ErrorCode::MessageExpired,
            format!("ttl {} exceeded at {}", budget.ttl, now),
        ));
    }

    if budget.call_budget_remaining == 0 {
        return Err(RelayError::new(
            ErrorCode::CallBudgetExhausted,
            "call budget exhausted".to_string(),
        ));
    }

    let mut ancestor_chain = budget.ancestor_chain.clone();
    ancestor_chain.push(current_endpoint.to_string());

    Ok(Admitted {
        updated_budget: Budget {
            hop_count: budget.hop_count + 1,
            max_hops: budget.max_hops,
            ancestor_chain,
            ttl: budget.ttl,
            call_budget_remaining: budget.call_budget_remaining - 1,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_budget() -> Budget {
        Budget {
            hop_count: 0,
            max_hops: 5,
            ancestor_chain: Vec::new(),
            ttl: now_ms() + 60_000,
            call_budget_remaining: 10,
        }
    }

    #[test]
    fn successful_hop_shrinks_budget() {
        let b = fresh_budget();
        let admitted = enforce(&b, "relay.agent.a", None).unwrap();
        assert_eq!(admitted.updated_budget.hop_count, 1);
        assert_eq!(admitted.updated_budget.call_budget_remaining, 9);
        assert_eq!(admitted.updated_budget.ancestor_chain, vec!["relay.agent.a"]);
    }

    #[test]
    fn rejects_max_hops() {
        let mut b = fresh_budget();
        b.hop_count = 5;
        let err = enforce(&b, "x", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::MaxHopsExceeded);
    }

    #[test]
    fn rejects_cycle() {
        let mut b = fresh_budget();
        b.ancestor_chain.push("relay.agent.x".to_string());
        let err = enforce(&b, "relay.agent.x", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::CycleDetected);
    }

    #[test]
    fn rejects_expired_ttl() {
        let mut b = fresh_budget();
        b.ttl = now_ms() - 1000;
        let err = enforce(&b, "x", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::MessageExpired);
    }

    #[test]
    fn rejects_exhausted_call_budget() {
        let mut b = fresh_budget();
        b.call_budget_remaining = 0;
        let err = enforce(&b, "x", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::CallBudgetExhausted);
    }

    #[test]
    fn ordering_hops_before_cycle_before_ttl_before_call_budget() {
        // All four conditions violated at once: hops must win.
        let b = Budget {
            hop_count: 5,
            max_hops: 5,
            ancestor_chain: vec!["x".to_string()],
            ttl: now_ms() - 1,
            call_budget_remaining: 0,
        };
        let err = enforce(&b, "x", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::MaxHopsExceeded);

        // Cycle before ttl/call-budget.
        let b = Budget {
            hop_count: 0,
            max_hops: 5,
            ancestor_chain: vec!["x".to_string()],
            ttl: now_ms() - 1,
            call_budget_remaining: 0,
        };
        let err = enforce(&b, "x", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::CycleDetected);

        // ttl before call-budget.
        let b = Budget {
            hop_count: 0,
            max_hops: 5,
            ancestor_chain: vec![],
            ttl: now_ms() - 1,
            call_budget_remaining: 0,
        };
        let err = enforce(&b, "x", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::MessageExpired);
    }

    #[test]
    fn never_grows_other_fields() {
        let b = fresh_budget();
        let admitted = enforce(&b, "e1", None).unwrap();
        assert_eq!(admitted.updated_budget.max_hops, b.max_hops);
        assert_eq!(admitted.updated_budget.ttl, b.ttl);
    }
}
