// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by the binding store and router.

use relay_envelope::{ErrorCode, RelayError};

/// Failure modes distinct to binding CRUD and routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// No binding with this id exists.
    #[error("binding not found: {0}")]
    NotFound(String),
    /// `bindings.json` or `session-map.json` could not be read or written.
    #[error("binding store I/O error: {0}")]
    Io(String),
}

impl From<RouterError> for RelayError {
    fn from(e: RouterError) -> Self {
        let code = match &e {
            RouterError::NotFound(_) => ErrorCode::NotFound,
            RouterError::Io(_) => ErrorCode::IoError,
        };
        RelayError::new(code, e.to_string())
    }
}
