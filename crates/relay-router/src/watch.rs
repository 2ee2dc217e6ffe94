// SPDX-License-Identifier: MIT OR Apache-2.0
//! Filesystem watcher driving [`BindingStore::reload`] and
//! [`SessionMap::reload`], consulting each store's [`GenerationGuard`]
//! before reloading so the watcher does not chase its own writes.

use std::path::PathBuf;
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::store::BindingStore;

use crate::session_map::SessionMap;

const STABILITY_WINDOW: Duration = Duration::from_millis(150);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running watcher on a [`BindingStore`]/[`SessionMap`] pair's shared
/// data directory. Dropping this handle stops the background thread.
pub struct RouterWatcher {
    stop_tx: std::sync::mpsc::Sender<()>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl RouterWatcher {
    /// Start watching `store`'s and `session_map`'s data directory
    /// (expected to be the same directory) for changes to `bindings.json`
    /// and `session-map.json`.
    #[must_use]
    pub fn spawn(store: Arc<BindingStore>, session_map: Arc<SessionMap>) -> Self {
        let (stop_tx, stop_rx) = channel::<()>();
        let dir = store.dir().to_path_buf();

        let join_handle = std::thread::spawn(move || {
            run_watch_loop(store, session_map, dir, stop_rx);
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

impl Drop for RouterWatcher {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

fn touches(paths: &[PathBuf], name: &str) -> bool {
    paths.iter().any(|p| p.file_name().and_then(|n| n.to_str()) == Some(name))
}

fn run_watch_loop(
    store: Arc<BindingStore>,
    session_map: Arc<SessionMap>,
    dir: PathBuf,
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
            warn!(target: "relay.router", path = %dir.display(), error = %e, "failed to start binding store watcher");
            return;
        }
    };

    if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
        warn!(target: "relay.router", path = %dir.display(), error = %e, "failed to watch binding store dir");
        return;
    }

    let mut bindings_pending = false;
    let mut session_map_pending = false;
    let mut last_event = std::time::Instant::now();

    loop {
        if stop_rx.try_recv().is_ok() {
            break;
        }
        match event_rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if touches(&event.paths, "bindings.json") {
                    bindings_pending = true;
                    last_event = std::time::Instant::now();
                }
                if touches(&event.paths, "session-map.json") {
                    session_map_pending = true;
                    last_event = std::time::Instant::now();
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_event.elapsed() < STABILITY_WINDOW {
            continue;
        }

        if bindings_pending {
            bindings_pending = false;
            if store.generation_guard().should_reload() {
                debug!(target: "relay.router", "bindings.json changed externally, reloading");
                store.reload();
            }
        }
        if session_map_pending {
            session_map_pending = false;
            if session_map.generation_guard().should_reload() {
                debug!(target: "relay.router", "session-map.json changed externally, reloading");
                session_map.reload();
            }
        }
    }
}
