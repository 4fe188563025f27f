//! Domain types for the TaleKeeper sync core

mod common;
mod event;
mod ids;
mod library;
mod playthrough;
mod sync;

pub use common::{Duration, Timestamp};
pub use event::{PlaybackEvent, PlaybackEventType};
pub use ids::{DeviceId, EventId, MediaId, PlaythroughId, SourceId};
pub use library::{
    Author, Book, BookAuthor, Media, MediaNarrator, Narrator, Person, Series, SeriesBook,
};
pub use playthrough::{Playthrough, PlaythroughStateCache, PlaythroughStatus};
pub use sync::{DeletableType, DeletionRecord, SyncedServer};
