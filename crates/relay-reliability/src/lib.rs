// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Three independent, compositionally gating reliability subsystems: a
//! per-sender sliding-window rate limiter, a per-endpoint circuit breaker,
//! and per-endpoint mailbox backpressure. All three run before mailbox
//! persistence in the delivery pipeline.

mod backpressure;
mod circuit_breaker;
mod rate_limit;

pub use backpressure::{check_backpressure, BackpressureConfig, BackpressureDecision};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use rate_limit::{check_rate_limit, RateLimitConfig, RateLimitDecision};
