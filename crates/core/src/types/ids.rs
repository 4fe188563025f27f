//! Identifier types
//!
//! Library entities are always scoped by the remote source they came from, so
//! identity is the pair (source, id). Event and playthrough ids are generated
//! on the client and must be globally unique; the remote source deduplicates
//! pushed events by event id.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a remote source (server) this client syncs against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Creates a source id from a server-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a media item (one recording of a book)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Creates a media id from a server-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-generated identifier of a playthrough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaythroughId(Uuid);

impl PlaythroughId {
    /// Generates a new random playthrough id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a playthrough id from its string form
    pub fn from_string(s: &str) -> Result<Self, AppError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| AppError::InvalidArgument {
                argument: "playthrough_id".to_string(),
                reason: format!("'{}' is not a valid UUID", s),
            })
    }

    /// Returns the id as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for PlaythroughId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaythroughId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-generated identifier of a playback event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a new random event id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an event id from its string form
    pub fn from_string(s: &str) -> Result<Self, AppError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| AppError::InvalidArgument {
                argument: "event_id".to_string(),
                reason: format!("'{}' is not a valid UUID", s),
            })
    }

    /// Returns the id as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of this installation, stamped on every recorded event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Generates a new random device id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a device id from a stored string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
