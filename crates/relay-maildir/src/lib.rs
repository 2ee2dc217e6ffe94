// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Durable per-endpoint mailboxes backed by a Maildir-style directory
//! layout: `tmp/`, `new/`, `cur/`, `failed/`, each created with owner-only
//! permissions. Every state transition is a single POSIX `rename`, so the
//! filesystem itself is the source of truth and claims are safe under
//! concurrent access without in-process locks.

mod error;
mod store;

pub use error::MaildirError;
pub use store::{ClaimedEnvelope, Mailbox, MaildirStore};
