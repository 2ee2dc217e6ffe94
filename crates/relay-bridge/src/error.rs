// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised while wiring the Message Receiver.

/// Failure modes distinct to receiver setup.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Subscribing a receiver pattern against the relay core failed.
    #[error("failed to subscribe {pattern}: {reason}")]
    SubscribeFailed {
        /// The pattern that failed to subscribe.
        pattern: String,
        /// Failure detail.
        reason: String,
    },
}
