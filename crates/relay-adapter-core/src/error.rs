// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by the adapter manager.

use relay_envelope::{ErrorCode, RelayError};

/// Errors specific to adapter lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// An adapter with this id is already registered.
    #[error("duplicate adapter id: {0}")]
    DuplicateId(String),
    /// The requested adapter type has no registered manifest/factory.
    #[error("unknown adapter type: {0}")]
    UnknownType(String),
    /// The manifest forbids a second instance of this type.
    #[error("adapter type {0} does not allow multiple instances")]
    MultiInstanceDenied(String),
    /// Attempted to remove the built-in `claude-code` adapter.
    #[error("cannot remove built-in adapter: {0}")]
    RemoveBuiltinDenied(String),
    /// The requested adapter id does not exist.
    #[error("adapter not found: {0}")]
    NotFound(String),
    /// Starting, stopping, or testing the adapter failed.
    #[error("adapter {id} failed: {reason}")]
    Runtime {
        /// The adapter's id.
        id: String,
        /// Failure detail.
        reason: String,
    },
    /// `adapters.json` could not be read or written.
    #[error("adapter config I/O error: {0}")]
    Io(String),
}

impl From<AdapterError> for RelayError {
    fn from(e: AdapterError) -> Self {
        let code = match &e {
            AdapterError::DuplicateId(_) => ErrorCode::DuplicateId,
            AdapterError::UnknownType(_) => ErrorCode::UnknownType,
            AdapterError::MultiInstanceDenied(_) => ErrorCode::MultiInstanceDenied,
            AdapterError::RemoveBuiltinDenied(_) => ErrorCode::RemoveBuiltinDenied,
            AdapterError::NotFound(_) => ErrorCode::NotFound,
            AdapterError::Runtime { .. } => ErrorCode::InternalError,
            AdapterError::Io(_) => ErrorCode::IoError,
        };
        RelayError::new(code, e.to_string())
    }
}
