// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by the SQLite index, convertible to the shared
//! [`RelayError`] catalog.

use relay_envelope::{ErrorCode, RelayError};

/// Errors specific to the SQLite index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The database could not be opened or its schema initialized.
    #[error("index unavailable: {0}")]
    Unavailable(String),
    /// A query failed after the index was opened successfully.
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
    /// A row could not be reconstructed from its stored JSON column.
    #[error("deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A filesystem error surfaced while rebuilding from the Maildir store.
    #[error(transparent)]
    Maildir(#[from] relay_maildir::MaildirError),
}

impl From<IndexError> for RelayError {
    fn from(e: IndexError) -> Self {
        let code = match &e {
            IndexError::Unavailable(_) => ErrorCode::IndexUnavailable,
            IndexError::Query(_) | IndexError::Serde(_) | IndexError::Maildir(_) => {
                ErrorCode::IndexQueryFailed
            }
        };
        RelayError::new(code, e.to_string())
    }
}
