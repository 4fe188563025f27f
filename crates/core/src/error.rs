//! Error types for TaleKeeper
//!
//! A single `AppError` taxonomy shared across the workspace. Errors carry
//! enough structure for callers to decide what to do; the sync engine in
//! particular relies on the distinction between transport failures (nothing
//! happened), remote failures (the server said no) and local database
//! failures (the transaction rolled back).

use std::fmt;
use thiserror::Error;

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Transient; a later attempt may succeed without intervention
    Recoverable,
    /// Feature degraded but the app can continue
    Degraded,
    /// Requires user action or restart
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for TaleKeeper
#[derive(Error, Debug)]
pub enum AppError {
    /// Network request failed before a response arrived
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database operation failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    /// Record not found in database
    #[error("Record not found: {entity} with {identifier}")]
    RecordNotFound { entity: String, identifier: String },

    /// Session for a source is no longer valid
    #[error("Session invalid for source '{source_id}'")]
    SessionInvalid { source_id: String },

    /// A value failed to serialize or deserialize
    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl AppError {
    /// Creates a network error with a source
    pub fn network<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a database error with a source
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an internal error from a message
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NetworkError { .. } | Self::DatabaseError { .. } => ErrorSeverity::Recoverable,
            Self::RecordNotFound { .. }
            | Self::SerializationError { .. }
            | Self::InvalidArgument { .. }
            | Self::InternalError { .. } => ErrorSeverity::Degraded,
            Self::MigrationFailed { .. } | Self::SessionInvalid { .. } => ErrorSeverity::Fatal,
        }
    }
}

/// Convenience result type for TaleKeeper operations
pub type Result<T> = std::result::Result<T, AppError>;
