// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised while assembling the daemon's subsystems.

/// Failure modes distinct to process assembly.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// A subsystem failed to subscribe against the relay core.
    #[error("failed to attach {component}: {reason}")]
    AttachFailed {
        /// The subsystem that failed to attach (e.g. "binding router").
        component: String,
        /// Failure detail.
        reason: String,
    },
}
