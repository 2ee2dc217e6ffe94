// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concrete [`PublishSink`] and [`PulseRunUpdater`] implementations wiring
//! adapters and the Pulse receiver path back into a running [`RelayCore`].

use std::sync::Arc;

use async_trait::async_trait;
use relay_adapter_core::PublishSink;
use relay_bridge::{PulseRunUpdate, PulseRunUpdater};
use relay_runtime::{PublishOpts, RelayCore};
use tracing::info;

/// Publishes adapter-translated inbound events through a running
/// [`RelayCore`], ensuring the target subject is a registered endpoint
/// before the first message from a freshly-seen chat.
pub struct RelaySink {
    core: Arc<RelayCore>,
}

impl RelaySink {
    /// Wrap `core` as a [`PublishSink`].
    #[must_use]
    pub fn new(core: Arc<RelayCore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl PublishSink for RelaySink {
    async fn publish(&self, subject: &str, payload: serde_json::Value, from: &str) -> anyhow::Result<()> {
        self.core.ensure_endpoint(subject)?;
        self.core.publish(
            subject,
            payload,
            PublishOpts {
                from: from.to_string(),
                reply_to: None,
                budget: None,
            },
        )?;
        Ok(())
    }
}

/// Reports a dispatched Pulse run's outcome to the structured log. The
/// Pulse scheduler itself is out of scope here, so there is no tracker to
/// call back into — this simply makes the outcome observable.
pub struct LoggingPulseUpdater;

#[async_trait]
impl PulseRunUpdater for LoggingPulseUpdater {
    async fn update_run(&self, run_id: &str, update: PulseRunUpdate) -> anyhow::Result<()> {
        info!(
            target: "relay.daemon",
            run_id,
            status = ?update.status,
            duration_ms = update.duration_ms,
            error = ?update.error,
            "pulse run finished"
        );
        Ok(())
    }
}
