// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! A SQLite-backed index derived from the Maildir store. The filesystem is
//! always the source of truth; this index exists for queries by subject,
//! endpoint, and status, TTL cleanup, and delivery metrics, and can be
//! rebuilt from scratch at any time via [`SqliteIndex::rebuild`].

mod error;
mod index;
mod metrics;
mod schema;

pub use error::IndexError;
pub use index::SqliteIndex;
pub use metrics::{GroupCount, IndexMetrics};
