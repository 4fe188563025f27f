//! Sync bookkeeping types: tombstones and per-source cursors

use crate::error::AppError;
use crate::types::{SourceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity types a deletion record can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletableType {
    Person,
    Author,
    Narrator,
    Book,
    Series,
    SeriesBook,
    BookAuthor,
    Media,
    MediaNarrator,
}

impl DeletableType {
    /// Returns the stable string form used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Author => "author",
            Self::Narrator => "narrator",
            Self::Book => "book",
            Self::Series => "series",
            Self::SeriesBook => "series_book",
            Self::BookAuthor => "book_author",
            Self::Media => "media",
            Self::MediaNarrator => "media_narrator",
        }
    }

    /// Parses the stable string form
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "person" => Ok(Self::Person),
            "author" => Ok(Self::Author),
            "narrator" => Ok(Self::Narrator),
            "book" => Ok(Self::Book),
            "series" => Ok(Self::Series),
            "series_book" => Ok(Self::SeriesBook),
            "book_author" => Ok(Self::BookAuthor),
            "media" => Ok(Self::Media),
            "media_narrator" => Ok(Self::MediaNarrator),
            other => Err(AppError::InvalidArgument {
                argument: "deletable_type".to_string(),
                reason: format!("unknown entity type '{}'", other),
            }),
        }
    }
}

impl fmt::Display for DeletableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tombstone instructing the local cache to remove an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionRecord {
    #[serde(rename = "type")]
    pub record_type: DeletableType,
    pub record_id: String,
    pub deleted_at: Timestamp,
}

/// Sync cursor row for one remote source
///
/// `last_down_sync` is when we last successfully asked "what changed";
/// `new_data_as_of` is the frontier of data actually observed. The two differ
/// after a sync round that returned no changes, and "changed since X" queries
/// must always use `new_data_as_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedServer {
    pub source_id: SourceId,
    pub last_down_sync: Option<Timestamp>,
    pub new_data_as_of: Option<Timestamp>,
}

impl SyncedServer {
    /// Creates a cursor row for a source that has never synced
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            last_down_sync: None,
            new_data_as_of: None,
        }
    }
}
