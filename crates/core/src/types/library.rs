//! Library entity models
//!
//! All entities are cached copies of server-side rows, keyed by the composite
//! pair (source, id). `inserted_at` is set once at creation; `updated_at` is
//! bumped on every merge and never regresses — the down-sync upsert relies on
//! that to discard stale deltas.

use crate::types::{Duration, MediaId, SourceId, Timestamp};
use serde::{Deserialize, Serialize};

/// A person who writes or narrates books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub source_id: SourceId,
    pub name: String,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub inserted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An author credit; references a person within the same source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub source_id: SourceId,
    pub person_id: String,
    pub name: String,
    pub inserted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A narrator credit; references a person within the same source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrator {
    pub id: String,
    pub source_id: SourceId,
    pub person_id: String,
    pub name: String,
    pub inserted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A book (the written work, independent of any recording)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub source_id: SourceId,
    pub title: String,
    pub published: Option<Timestamp>,
    pub inserted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A series of books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub source_id: SourceId,
    pub name: String,
    pub inserted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Membership of a book in a series, with its position in the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesBook {
    pub id: String,
    pub source_id: SourceId,
    pub book_id: String,
    pub series_id: String,
    /// Position within the series; a string because servers use "1", "1.5", "2a"
    pub book_number: String,
    pub inserted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Join row linking a book to one of its authors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookAuthor {
    pub id: String,
    pub source_id: SourceId,
    pub author_id: String,
    pub book_id: String,
    pub inserted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A media item: one recording of a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,
    pub source_id: SourceId,
    pub book_id: String,
    pub duration: Option<Duration>,
    pub abridged: bool,
    pub published: Option<Timestamp>,
    pub inserted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Join row linking a media item to one of its narrators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaNarrator {
    pub id: String,
    pub source_id: SourceId,
    pub media_id: MediaId,
    pub narrator_id: String,
    pub inserted_at: Timestamp,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Person {
        Person {
            id: "p1".to_string(),
            source_id: SourceId::new("server-1"),
            name: "John".to_string(),
            description: None,
            image_path: None,
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(1000),
        }
    }

    #[test]
    fn test_person_serde_round_trip() {
        let p = person();
        let json = serde_json::to_string(&p).unwrap();
        let back: Person = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn test_media_optional_fields() {
        let json = r#"{
            "id": "m1",
            "source_id": "server-1",
            "book_id": "b1",
            "duration": null,
            "abridged": false,
            "published": null,
            "inserted_at": 1000,
            "updated_at": 1000
        }"#;
        let media: Media = serde_json::from_str(json).unwrap();
        assert!(media.duration.is_none());
        assert!(!media.abridged);
    }
}
