// SPDX-License-Identifier: MIT OR Apache-2.0
//! Filesystem watcher triggering [`AdapterManager::reload`] when
//! `adapters.json` changes on disk.

use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::manager::AdapterManager;

const STABILITY_WINDOW: Duration = Duration::from_millis(150);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running watcher on an [`AdapterManager`]'s data directory. Dropping
/// this handle stops the background thread.
pub struct AdapterWatcher {
    stop_tx: std::sync::mpsc::Sender<()>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl AdapterWatcher {
    /// Start watching `manager`'s data directory for changes to
    /// `adapters.json`, calling [`AdapterManager::reload`] after a
    /// stability debounce.
    pub fn spawn(manager: std::sync::Arc<AdapterManager>, runtime: tokio::runtime::Handle) -> Self {
        let (stop_tx, stop_rx) = channel::<()>();
        let dir = manager.data_dir().to_path_buf();

        let join_handle = std::thread::spawn(move || {
            run_watch_loop(manager, dir, runtime, stop_rx);
        });

        Self {
            stop_tx,
            join_handle: Some(join_handle),
        }
    }

    /// Signal the watcher to stop and block until it exits.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AdapterWatcher {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

fn run_watch_loop(
    manager: std::sync::Arc<AdapterManager>,
    dir: std::path::PathBuf,
    runtime: tokio::runtime::Handle,
    stop_rx: std::sync::mpsc::Receiver<()>,
) {
    let (event_tx, event_rx) = channel();
    let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            let _ = event_tx.send(event);
        }
    }) {
        Ok(w) => w,
        Err(e) => {
            warn!(target: "relay.adapter", path = %dir.display(), error = %e, "failed to start adapter config watcher");
            return;
        }
    };

    if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
        warn!(target: "relay.adapter", path = %dir.display(), error = %e, "failed to watch adapter config dir");
        return;
    }

    let mut pending = false;
    let mut last_event = std::time::Instant::now();

    loop {
        if stop_rx.try_recv().is_ok() {
            break;
        }
        match event_rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                let touches_config = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().and_then(|n| n.to_str()) == Some("adapters.json"));
                if touches_config {
                    pending = true;
                    last_event = std::time::Instant::now();
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if pending && last_event.elapsed() >= STABILITY_WINDOW {
            pending = false;
            debug!(target: "relay.adapter", "adapters.json changed, reloading");
            let manager = std::sync::Arc::clone(&manager);
            runtime.block_on(async {
                if let Err(e) = manager.reload().await {
                    warn!(target: "relay.adapter", error = %e, "hot-reload failed");
                }
            });
        }
    }
}
