// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by the endpoint and subscription registries.

use relay_envelope::{ErrorCode, RelayError};

/// Errors specific to registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The subject failed validation or is a wildcard pattern, not concrete.
    #[error("invalid subject: {0}")]
    InvalidSubject(String),
    /// The subject (endpoint) or pattern (subscription) is already registered.
    #[error("already registered: {0}")]
    AlreadyRegistered(String),
    /// The requested endpoint/subscription id does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Underlying Maildir operation failed.
    #[error(transparent)]
    Maildir(#[from] relay_maildir::MaildirError),
    /// Reading or writing `subscriptions.json` failed.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl From<RegistryError> for RelayError {
    fn from(e: RegistryError) -> Self {
        let code = match &e {
            RegistryError::InvalidSubject(_) => ErrorCode::InvalidSubject,
            RegistryError::AlreadyRegistered(_) => ErrorCode::DuplicateId,
            RegistryError::NotFound(_) => ErrorCode::NotFound,
            RegistryError::Maildir(_) => ErrorCode::DeliveryFailed,
            RegistryError::Persistence(_) => ErrorCode::IoError,
        };
        RelayError::new(code, e.to_string())
    }
}
