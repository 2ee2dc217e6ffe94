// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by Maildir operations, convertible to the shared
//! [`RelayError`] catalog.

use relay_envelope::{ErrorCode, RelayError};

/// Errors specific to the Maildir store.
#[derive(Debug, thiserror::Error)]
pub enum MaildirError {
    /// The claim (`new/ -> cur/` rename) lost the race to another claimer.
    #[error("claim failed: {0}")]
    ClaimFailed(String),
    /// The write to `tmp/` or the rename into `new/` failed.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
    /// The named envelope does not exist in the expected state.
    #[error("not found: {0}")]
    NotFound(String),
    /// Underlying filesystem I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The envelope on disk could not be parsed as JSON.
    #[error("deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<MaildirError> for RelayError {
    fn from(e: MaildirError) -> Self {
        let code = match &e {
            MaildirError::ClaimFailed(_) => ErrorCode::ClaimFailed,
            MaildirError::DeliveryFailed(_) | MaildirError::Io(_) => ErrorCode::DeliveryFailed,
            MaildirError::NotFound(_) => ErrorCode::NotFound,
            MaildirError::Serde(_) => ErrorCode::SerializationError,
        };
        RelayError::new(code, e.to_string())
    }
}
