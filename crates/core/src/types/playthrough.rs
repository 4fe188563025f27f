//! Playthrough aggregate and state cache types
//!
//! A `Playthrough` row is a materialized view over its event log: it is only
//! ever written by the fold in the recorder, never edited by hand. The state
//! cache is a non-authoritative fast path for the position heartbeat.

use crate::error::AppError;
use crate::types::{Duration, MediaId, PlaythroughId, SourceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a playthrough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaythroughStatus {
    InProgress,
    Finished,
    Abandoned,
    Deleted,
}

impl PlaythroughStatus {
    /// Returns the stable string form used in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
            Self::Abandoned => "abandoned",
            Self::Deleted => "deleted",
        }
    }

    /// Parses the stable string form
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "finished" => Ok(Self::Finished),
            "abandoned" => Ok(Self::Abandoned),
            "deleted" => Ok(Self::Deleted),
            other => Err(AppError::InvalidArgument {
                argument: "playthrough_status".to_string(),
                reason: format!("unknown status '{}'", other),
            }),
        }
    }

    /// Returns true for finished, abandoned or deleted
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for PlaythroughStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate state of one listen-through of a media item
///
/// Derived: always equal to the fold of its events in timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playthrough {
    pub id: PlaythroughId,
    pub source_id: SourceId,
    pub media_id: MediaId,
    pub status: PlaythroughStatus,
    pub position: Duration,
    pub rate: f32,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub abandoned_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
    /// Timestamp of the newest event folded into this aggregate
    pub last_event_at: Timestamp,
}

impl Playthrough {
    /// Returns true if the playthrough has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Latest known position and rate for a playthrough
///
/// Written every few seconds during playback by the heartbeat, far more often
/// than the event log. Lost on reinstall; the event log is the durable record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaythroughStateCache {
    pub playthrough_id: PlaythroughId,
    pub position: Duration,
    pub rate: Option<f32>,
    pub updated_at: Timestamp,
}
