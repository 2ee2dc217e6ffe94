// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The publish/match/enforce/fan-out delivery pipeline: [`RelayCore`] ties
//! the subject matcher, budget enforcer, Maildir store, SQLite index,
//! endpoint/subscription registries, and reliability gates together, backed
//! by an ephemeral signal bus, an access control list, a bounded
//! recently-dispatched set, a dead-letter queue view, and a filesystem-watch
//! fallback for messages the synchronous path missed.

mod access;
mod core;
mod dlq;
mod fs_watch;
mod recently_dispatched;
mod signal_bus;

pub use access::{AccessControl, AccessDecision, AccessRule};
pub use core::{PublishOpts, PublishResult, RelayCore};
pub use dlq::DeadLetterQueue;
pub use fs_watch::EndpointWatcher;
pub use recently_dispatched::RecentlyDispatched;
pub use signal_bus::{FilteredSignalSubscription, SignalBus, SignalBusStats, SignalSubscription};
