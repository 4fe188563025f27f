//! Wire protocol types
//!
//! Request and response bodies exchanged with a remote source. Server-side
//! times are `DateTime<Utc>`; they become [`talekeeper_core::Timestamp`]
//! values the moment they are persisted locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use talekeeper_core::{
    Author, Book, BookAuthor, DeletionRecord, DeviceId, EventId, Media, MediaNarrator, Narrator,
    Person, PlaybackEvent, Series, SeriesBook, SourceId,
};

/// Asks a source for everything that changed since a point in time
///
/// `since` carries the local `new_data_as_of` cursor; `None` requests the
/// full library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryChangesRequest {
    pub source_id: SourceId,
    pub since: Option<DateTime<Utc>>,
}

/// Everything a source reports as changed: entity deltas plus tombstones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryChangesResponse {
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub narrators: Vec<Narrator>,
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub series_books: Vec<SeriesBook>,
    #[serde(default)]
    pub book_authors: Vec<BookAuthor>,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub media_narrators: Vec<MediaNarrator>,
    #[serde(default)]
    pub deletions: Vec<DeletionRecord>,
    /// The server's clock at response time; becomes the new sync cursor
    pub server_time: DateTime<Utc>,
}

impl LibraryChangesResponse {
    /// Number of entity deltas across all tables, excluding deletions
    pub fn delta_count(&self) -> usize {
        self.people.len()
            + self.authors.len()
            + self.narrators.len()
            + self.books.len()
            + self.series.len()
            + self.series_books.len()
            + self.book_authors.len()
            + self.media.len()
            + self.media_narrators.len()
    }

    /// True when the round carried neither deltas nor deletions
    pub fn is_empty(&self) -> bool {
        self.delta_count() == 0 && self.deletions.is_empty()
    }
}

/// Pushes locally recorded playback events up to a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPushRequest {
    pub source_id: SourceId,
    pub device_id: DeviceId,
    pub events: Vec<PlaybackEvent>,
    /// When this client last completed a sync, for server-side diagnostics
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// The source's acknowledgement of pushed events
///
/// `accepted` may be a subset of what was pushed; anything missing stays
/// unsynced locally and is re-pushed next round. The server deduplicates
/// by event id, so re-pushing is safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPushResponse {
    pub accepted: Vec<EventId>,
    pub server_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use talekeeper_core::Timestamp;

    fn empty_response() -> LibraryChangesResponse {
        LibraryChangesResponse {
            people: vec![],
            authors: vec![],
            narrators: vec![],
            books: vec![],
            series: vec![],
            series_books: vec![],
            book_authors: vec![],
            media: vec![],
            media_narrators: vec![],
            deletions: vec![],
            server_time: Utc::now(),
        }
    }

    #[test]
    fn test_empty_response_counts() {
        let response = empty_response();
        assert_eq!(response.delta_count(), 0);
        assert!(response.is_empty());
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let json = format!(r#"{{"server_time": "{}"}}"#, Utc::now().to_rfc3339());
        let response: LibraryChangesResponse = serde_json::from_str(&json).unwrap();
        assert!(response.is_empty());
    }

    #[test]
    fn test_delta_count_spans_tables() {
        let mut response = empty_response();
        response.people.push(Person {
            id: "p1".to_string(),
            source_id: SourceId::new("server-1"),
            name: "Someone".to_string(),
            description: None,
            image_path: None,
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(1000),
        });
        response.series.push(Series {
            id: "s1".to_string(),
            source_id: SourceId::new("server-1"),
            name: "A Series".to_string(),
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(1000),
        });
        assert_eq!(response.delta_count(), 2);
        assert!(!response.is_empty());
    }
}
