// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ephemeral [`Signal`] broadcast: `emitSignal`/`onSignal` over a single
//! internal channel, with in-listener pattern matching so each subscriber
//! only sees signals for subjects it asked about. Never persisted, carries
//! no ordering guarantees relative to messages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use relay_envelope::Signal;
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Default)]
struct Stats {
    total_emitted: AtomicU64,
    dropped: AtomicU64,
}

/// Point-to-multipoint signal broadcaster backed by a single
/// `tokio::sync::broadcast` channel.
pub struct SignalBus {
    sender: broadcast::Sender<Signal>,
    stats: Arc<Stats>,
}

impl SignalBus {
    /// A bus with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A bus whose internal channel holds at most `capacity` unread signals
    /// before the slowest subscriber starts lagging.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            stats: Arc::new(Stats::default()),
        }
    }

    /// Broadcast `signal` to every current subscriber. A send with no
    /// subscribers is not an error — signals are fire-and-forget.
    pub fn emit(&self, signal: Signal) {
        self.stats.total_emitted.fetch_add(1, Ordering::Relaxed);
        debug!(target: "relay.signal", endpoint = %signal.endpoint_subject, "signal emitted");
        let _ = self.sender.send(signal);
    }

    /// Subscribe to every signal, unfiltered.
    #[must_use]
    pub fn subscribe(&self) -> SignalSubscription {
        SignalSubscription {
            receiver: self.sender.subscribe(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Subscribe to signals whose `endpoint_subject` matches `pattern`.
    #[must_use]
    pub fn subscribe_pattern(&self, pattern: impl Into<String>) -> FilteredSignalSubscription {
        FilteredSignalSubscription {
            inner: self.subscribe(),
            pattern: pattern.into(),
        }
    }

    /// Current emit/drop counters.
    #[must_use]
    pub fn stats(&self) -> SignalBusStats {
        SignalBusStats {
            total_emitted: self.stats.total_emitted.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of [`SignalBus`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalBusStats {
    /// Total signals ever emitted.
    pub total_emitted: u64,
    /// Signals dropped because a subscriber lagged behind the channel.
    pub dropped: u64,
}

/// An unfiltered handle on the signal stream.
pub struct SignalSubscription {
    receiver: broadcast::Receiver<Signal>,
    stats: Arc<Stats>,
}

impl SignalSubscription {
    /// Await the next signal, skipping over any lag gap (recording it in
    /// the bus's dropped counter) rather than returning an error.
    pub async fn recv(&mut self) -> Option<Signal> {
        loop {
            match self.receiver.recv().await {
                Ok(signal) => return Some(signal),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.stats.dropped.fetch_add(n, Ordering::Relaxed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// A subscription that only yields signals matching a pattern, checked in
/// the listener rather than by the bus (the bus has no notion of
/// subscribers — just one shared channel).
pub struct FilteredSignalSubscription {
    inner: SignalSubscription,
    pattern: String,
}

impl FilteredSignalSubscription {
    /// Await the next matching signal, silently skipping non-matches.
    pub async fn recv(&mut self) -> Option<Signal> {
        loop {
            let signal = self.inner.recv().await?;
            if relay_subject::matches_pattern(&signal.endpoint_subject, &self.pattern) {
                return Some(signal);
            }
        }
    }
}
