// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Adapter`] trait and the lifecycle state every running instance
//! reports through [`AdapterStatus`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where a started adapter publishes translated inbound platform events.
/// Kept minimal and decoupled from `relay-runtime` so this crate has no
/// dependency on the delivery pipeline; `relay-daemon` supplies the
/// concrete implementation backed by `RelayCore::publish`.
#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Publish `payload` on `subject`, attributed to `from`.
    async fn publish(&self, subject: &str, payload: serde_json::Value, from: &str) -> anyhow::Result<()>;
}

/// Lifecycle state of a running adapter instance, reused from the
/// teacher's sidecar lifecycle shape (`Uninitialized`/`Starting`/… mapped
/// down to the states that make sense for a platform adapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    /// Configured but not yet started.
    Disconnected,
    /// `start` is in flight.
    Connecting,
    /// Running and able to translate platform events.
    Connected,
    /// `start` or a runtime operation failed.
    Error,
}

/// A snapshot of one adapter instance's runtime status, as surfaced by
/// `getCatalog()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterStatus {
    /// Current lifecycle state.
    pub state: AdapterState,
    /// Messages translated inbound (platform → Relay).
    pub messages_in: u64,
    /// Messages translated outbound (Relay → platform).
    pub messages_out: u64,
    /// Count of runtime errors since start.
    pub error_count: u64,
    /// Most recent error message, if any.
    pub last_error: Option<String>,
}

impl Default for AdapterStatus {
    fn default() -> Self {
        Self {
            state: AdapterState::Disconnected,
            messages_in: 0,
            messages_out: 0,
            error_count: 0,
            last_error: None,
        }
    }
}

/// A running (or startable) external integration translating platform
/// events into Relay publishes and vice versa.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Begin translating platform events, publishing inbound messages
    /// through `sink`.
    async fn start(&self, sink: Arc<dyn PublishSink>) -> anyhow::Result<()>;

    /// Stop translating. Idempotent.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Verify connectivity without fully starting, where the adapter
    /// supports it. The default falls back to start-then-stop.
    async fn test_connection(&self, sink: Arc<dyn PublishSink>) -> anyhow::Result<()> {
        self.start(Arc::clone(&sink)).await?;
        self.stop().await
    }

    /// Current runtime status.
    fn status(&self) -> AdapterStatus;

    /// The subject pattern this adapter should receive outbound deliveries
    /// for (e.g. `relay.human.telegram-1.>`). An empty pattern means the
    /// adapter has no outbound leg (pure inbound source). The daemon is
    /// responsible for subscribing this pattern against the running relay
    /// core and routing matches to [`Self::deliver_outbound`].
    fn outbound_pattern(&self) -> String {
        String::new()
    }

    /// Translate a relay envelope addressed to this adapter's outbound
    /// pattern into a platform API call.
    async fn deliver_outbound(&self, _subject: &str, _payload: serde_json::Value) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Builds a fresh [`Adapter`] instance from its persisted config. Builtin
/// adapter types register a factory with [`crate::AdapterManager`]; plugin
/// types resolve through the plugin loader instead.
pub type AdapterFactory = Arc<dyn Fn(&serde_json::Value) -> anyhow::Result<Arc<dyn Adapter>> + Send + Sync>;
