// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors specific to the webhook adapter.

/// Failure modes distinct to webhook setup and delivery.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// `channel` was missing from the adapter's config.
    #[error("webhook adapter config is missing channel")]
    MissingChannel,
    /// `listen_port` was missing or out of range.
    #[error("webhook adapter config has an invalid listen_port")]
    InvalidPort,
    /// Binding the inbound listener failed.
    #[error("failed to bind webhook listener: {0}")]
    Bind(String),
    /// No `outbound_url` configured but an outbound delivery was attempted.
    #[error("webhook adapter has no outbound_url configured")]
    NoOutboundUrl,
}
