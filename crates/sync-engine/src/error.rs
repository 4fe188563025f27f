//! Sync error taxonomy
//!
//! Errors are split by who is at fault: the network, the server, our
//! credentials, or the local database. Callers react differently to each;
//! in particular only [`SyncError::Unauthorized`] invalidates the session.

use talekeeper_core::AppError;
use thiserror::Error;

/// Result alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors produced while talking to a remote source
#[derive(Debug, Error)]
pub enum SyncError {
    /// The server could not be reached at all
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-success status
    #[error("server returned status {status}: {message}")]
    Remote { status: u16, message: String },

    /// The server rejected our credentials
    #[error("session rejected by source '{0}'")]
    Unauthorized(String),

    /// The server answered with a body we could not understand
    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    /// A local persistence failure
    #[error(transparent)]
    Local(#[from] AppError),
}

impl SyncError {
    /// True when the failure means our session is no longer valid
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Unauthorized(_))
    }

    /// True when retrying later without user action could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Remote { .. })
    }
}
