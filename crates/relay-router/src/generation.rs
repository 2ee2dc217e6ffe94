// SPDX-License-Identifier: MIT OR Apache-2.0
//! Self-write suppression for a watched, file-backed store (§4.8, precise
//! contract): every own save increments `save_generation`; a filesystem
//! watcher compares `last_reloaded_generation` against it before deciding
//! whether an observed change event is our own write or an external edit.

use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks the save/reload generation pair for one watched file.
#[derive(Debug, Default)]
pub struct GenerationGuard {
    save_generation: AtomicU64,
    last_reloaded_generation: AtomicU64,
}

impl GenerationGuard {
    /// A guard starting at generation zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Call after every successful save to this guard's file.
    pub fn mark_saved(&self) {
        self.save_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Call when a filesystem change event fires for this guard's file.
    /// Returns whether the caller should actually reload: `false` means
    /// the event was absorbed as one of our own saves (one unit of the
    /// gap is caught up); `true` means the file changed externally.
    pub fn should_reload(&self) -> bool {
        let save_generation = self.save_generation.load(Ordering::SeqCst);
        let last_reloaded = self.last_reloaded_generation.load(Ordering::SeqCst);
        if last_reloaded < save_generation {
            self.last_reloaded_generation.fetch_add(1, Ordering::SeqCst);
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbs_exactly_n_events_after_n_saves() {
        let guard = GenerationGuard::new();
        guard.mark_saved();
        guard.mark_saved();
        guard.mark_saved();
        assert!(!guard.should_reload());
        assert!(!guard.should_reload());
        assert!(!guard.should_reload());
        assert!(guard.should_reload());
    }

    #[test]
    fn reloads_promptly_with_no_pending_saves() {
        let guard = GenerationGuard::new();
        assert!(guard.should_reload());
        assert!(guard.should_reload());
    }

    #[test]
    fn rapid_successive_saves_collapse_gracefully() {
        let guard = GenerationGuard::new();
        guard.mark_saved();
        assert!(!guard.should_reload());
        guard.mark_saved();
        guard.mark_saved();
        assert!(!guard.should_reload());
        assert!(!guard.should_reload());
        assert!(guard.should_reload());
    }
}
