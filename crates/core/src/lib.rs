//! TaleKeeper core types
//!
//! Shared domain types for the TaleKeeper audiobook client: scoped library
//! entities, the playback event log, playthrough aggregates, sync cursors,
//! and the application error taxonomy. This crate performs no I/O.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ErrorSeverity, Result};
pub use types::{
    Author, Book, BookAuthor, DeletableType, DeletionRecord, DeviceId, Duration, EventId, Media,
    MediaId, MediaNarrator, Narrator, Person, PlaybackEvent, PlaybackEventType, Playthrough,
    PlaythroughId, PlaythroughStateCache, PlaythroughStatus, Series, SeriesBook, SourceId,
    SyncedServer, Timestamp,
};
