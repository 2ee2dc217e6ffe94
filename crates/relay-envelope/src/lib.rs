// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Shared data model for the relay bus: envelopes, budgets, the error
//! catalog, and the types derived from the Maildir filesystem (indexed
//! messages, dead letters, trace spans, ephemeral signals).

pub mod budget;
pub mod envelope;
pub mod error;
pub mod index_types;
pub mod signal;
pub mod trace;

pub use budget::{enforce as enforce_budget, Admitted, Budget};
pub use envelope::Envelope;
pub use error::{ErrorCode, RelayError};
pub use index_types::{DeadLetter, IndexedMessage, MessageStatus};
pub use signal::{Signal, SignalKind};
pub use trace::{TraceSpan, TraceStatus};
