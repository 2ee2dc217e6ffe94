// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Process assembly for the relay bus: wires [`RelayCore`] together with
//! the Adapter Manager, Binding Router, and Message Receiver, and exposes
//! the assembled handles for the binary's signal-driven main loop.

mod error;
mod sink;

pub use error::DaemonError;
pub use sink::{LoggingPulseUpdater, RelaySink};

use std::sync::Arc;

use relay_adapter_core::{AdapterManager, AdapterWatcher};
use relay_agent_iface::mock::MockSessionCreator;
use relay_bridge::MessageReceiver;
use relay_config::ResolvedOptions;
use relay_envelope::{Envelope, RelayError};
use relay_router::{BindingRouter, BindingStore, RouterWatcher, SessionMap};
use relay_runtime::RelayCore;
use tracing::{info, warn};

/// Every long-lived handle produced by [`assemble`], kept alive for the
/// daemon's lifetime. Dropping this tears down the filesystem watchers;
/// the relay core itself is shut down separately via [`RelayCore::shutdown`].
pub struct Daemon {
    /// The delivery pipeline every other subsystem publishes through.
    pub core: Arc<RelayCore>,
    /// Owns adapter configuration and the running instance set.
    pub adapters: Arc<AdapterManager>,
    /// Persisted chat-to-session bindings and the `relay.human.>` router.
    pub router: Arc<BindingRouter>,
    /// Bridges `relay.agent.>` and `relay.system.pulse.>` to the agent runtime.
    pub receiver: Arc<MessageReceiver>,
    adapter_watcher: Option<AdapterWatcher>,
    router_watcher: Option<RouterWatcher>,
}

impl Daemon {
    /// Stop watchers and the relay core in the documented order (§4.7):
    /// watchers first, then the core.
    pub fn shutdown(mut self) {
        if let Some(w) = self.adapter_watcher.take() {
            w.stop();
        }
        if let Some(w) = self.router_watcher.take() {
            w.stop();
        }
        self.core.shutdown();
    }
}

/// Build every subsystem rooted at `options.data_dir`, start configured
/// adapters, and attach the Binding Router and Message Receiver to the
/// relay core. `default_cwd` is the working directory fresh sessions are
/// rooted at absent a more specific one (a binding's `projectPath`, or a
/// Pulse dispatch's `cwd`).
pub async fn assemble(options: ResolvedOptions, default_cwd: String) -> anyhow::Result<Daemon> {
    std::fs::create_dir_all(&options.data_dir)?;
    let core = Arc::new(RelayCore::open(&options.data_dir, options.clone())?);

    let sink: Arc<dyn relay_adapter_core::PublishSink> = Arc::new(RelaySink::new(Arc::clone(&core)));
    let adapters = Arc::new(AdapterManager::new(options.data_dir.clone(), sink));
    adapters
        .register_manifest(relay_adapter_telegram::manifest(), Arc::new(relay_adapter_telegram::build))
        .await;
    adapters
        .register_manifest(relay_adapter_webhook::manifest(), Arc::new(relay_adapter_webhook::build))
        .await;
    adapters.initialize().await?;

    let adapter_watcher = Some(AdapterWatcher::spawn(Arc::clone(&adapters), tokio::runtime::Handle::current()));

    wire_outbound_deliveries(&core, &adapters).await;

    let binding_store = Arc::new(BindingStore::open(options.data_dir.clone()));
    let session_map = Arc::new(SessionMap::open(options.data_dir.clone()));
    let router_watcher = Some(RouterWatcher::spawn(Arc::clone(&binding_store), Arc::clone(&session_map)));

    let creator = Arc::new(MockSessionCreator::new());
    let router = Arc::new(BindingRouter::new(
        Arc::clone(&binding_store),
        Arc::clone(&session_map),
        creator.clone(),
        Arc::clone(&core),
        tokio::runtime::Handle::current(),
    ));
    router
        .attach()
        .map_err(|e: RelayError| DaemonError::AttachFailed {
            component: "binding router".to_string(),
            reason: e.message,
        })?;

    let receiver = Arc::new(MessageReceiver::new(
        Arc::clone(&core),
        creator,
        Arc::new(LoggingPulseUpdater),
        default_cwd,
        tokio::runtime::Handle::current(),
    ));
    receiver
        .start()
        .map_err(|e| DaemonError::AttachFailed {
            component: "message receiver".to_string(),
            reason: e.to_string(),
        })?;

    info!(target: "relay.daemon", data_dir = %options.data_dir.display(), "relay bus assembled");

    Ok(Daemon {
        core,
        adapters,
        router,
        receiver,
        adapter_watcher,
        router_watcher,
    })
}

/// Subscribe every running adapter's `outbound_pattern()` against `core`,
/// routing matches to the adapter's `deliver_outbound`. Adapters with an
/// empty pattern (pure inbound sources) are skipped. Adapters started
/// later via hot-reload are not retroactively wired; re-running the
/// daemon picks them up.
async fn wire_outbound_deliveries(core: &Arc<RelayCore>, adapters: &Arc<AdapterManager>) {
    for (id, adapter) in adapters.running_adapters().await {
        let pattern = adapter.outbound_pattern();
        if pattern.is_empty() {
            continue;
        }
        let runtime = tokio::runtime::Handle::current();
        let result = core.subscribe(
            &pattern,
            Arc::new(move |envelope: &Envelope| {
                let adapter = Arc::clone(&adapter);
                let subject = envelope.subject.clone();
                let payload = envelope.payload.clone();
                let runtime = runtime.clone();
                tokio::task::block_in_place(move || runtime.block_on(async move { adapter.deliver_outbound(&subject, payload).await }))
                    .map_err(|e| RelayError::new(relay_envelope::ErrorCode::InternalError, e.to_string()))
            }),
        );
        match result {
            Ok(_) => info!(target: "relay.daemon", id, pattern, "wired adapter outbound delivery"),
            Err(e) => warn!(target: "relay.daemon", id, pattern, error = %e, "failed to wire adapter outbound delivery"),
        }
    }
}
