// SPDX-License-Identifier: MIT OR Apache-2.0
//! Filesystem-watch fallback (§4.7): a second-chance delivery path for
//! files that appear under a registered endpoint's `new/` directory
//! without going through [`crate::RelayCore::publish`] — other writers,
//! tests, tools, or a crashed synchronous path. The atomic claim in
//! [`crate::RelayCore::claim_and_dispatch`] still guarantees exactly-one
//! processing under concurrency with the synchronous path.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::core::RelayCore;

/// How long a watcher waits for new write-finish events before checking
/// its shutdown flag again.
const POLL_INTERVAL: Duration = Duration::from_millis(150);

/// A running watcher for one endpoint's `new/` directory. Dropping this
/// handle (or calling [`Self::stop`]) tears down the background thread.
pub struct EndpointWatcher {
    stop_tx: std::sync::mpsc::Sender<()>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl EndpointWatcher {
    /// Start watching `endpoint_hash`'s `new/` directory (rooted at
    /// `mailboxes_root`) for files the synchronous publish path didn't
    /// already claim, dispatching them through `core`.
    pub fn spawn(core: std::sync::Arc<RelayCore>, mailboxes_root: &Path, subject: String, endpoint_hash: String) -> Self {
        let watch_dir = mailboxes_root.join(&endpoint_hash).join("new");
        let (stop_tx, stop_rx) = channel::<()>();

        let join_handle = std::thread::spawn(move || {
            run_watch_loop(core, watch_dir, subject, endpoint_hash, stop_rx);
        });

        Self {
            stop_tx,
            join_handle: Some(join_handle),
        }
    }

    /// Signal the watcher thread to stop and block until it exits.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EndpointWatcher {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

fn run_watch_loop(
    core: std::sync::Arc<RelayCore>,
    watch_dir: PathBuf,
    subject: String,
    endpoint_hash: String,
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
            warn!(target: "relay.fswatch", path = %watch_dir.display(), error = %e, "failed to start watcher");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        warn!(target: "relay.fswatch", path = %watch_dir.display(), error = %e, "failed to watch directory");
        return;
    }

    debug!(target: "relay.fswatch", path = %watch_dir.display(), "watcher started");

    loop {
        if stop_rx.try_recv().is_ok() {
            break;
        }
        match event_rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if !matches!(event.kind, notify::EventKind::Create(_) | notify::EventKind::Modify(_)) {
                    continue;
                }
                for path in event.paths {
                    handle_candidate(&core, &subject, &endpoint_hash, &path);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(target: "relay.fswatch", path = %watch_dir.display(), "watcher stopped");
}

fn handle_candidate(core: &RelayCore, subject: &str, endpoint_hash: &str, path: &Path) {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return;
    }
    let Some(filename) = path.file_stem().and_then(|s| s.to_str()) else {
        return;
    };
    if core.was_recently_dispatched(filename) {
        return;
    }
    debug!(target: "relay.fswatch", filename, "second-chance dispatch");
    core.claim_and_dispatch(subject, endpoint_hash, filename);
}
