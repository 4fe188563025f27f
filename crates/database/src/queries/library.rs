//! Library cache database operations
//!
//! Upserts implement last-write-wins on the row's own `updated_at`: a delta
//! whose `updated_at` is not newer than the cached row leaves the row
//! untouched, so stale or re-delivered deltas can never regress the cache.
//! `inserted_at` is written once and never part of the conflict update.

use sqlx::{Row, SqliteExecutor};
use talekeeper_core::{
    AppError, Author, Book, BookAuthor, DeletableType, Duration, Media, MediaId, MediaNarrator,
    Narrator, Person, Series, SeriesBook, SourceId, Timestamp,
};

/// Upserts a person by (source, id)
pub async fn upsert_person(
    executor: impl SqliteExecutor<'_>,
    person: &Person,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO people (id, source_id, name, description, image_path, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            image_path = excluded.image_path,
            updated_at = excluded.updated_at
        WHERE excluded.updated_at > people.updated_at
        "#,
    )
    .bind(&person.id)
    .bind(person.source_id.as_str())
    .bind(&person.name)
    .bind(&person.description)
    .bind(&person.image_path)
    .bind(person.inserted_at.as_millis())
    .bind(person.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert person", e))?;

    Ok(())
}

/// Upserts an author by (source, id)
pub async fn upsert_author(
    executor: impl SqliteExecutor<'_>,
    author: &Author,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO authors (id, source_id, person_id, name, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, id) DO UPDATE SET
            person_id = excluded.person_id,
            name = excluded.name,
            updated_at = excluded.updated_at
        WHERE excluded.updated_at > authors.updated_at
        "#,
    )
    .bind(&author.id)
    .bind(author.source_id.as_str())
    .bind(&author.person_id)
    .bind(&author.name)
    .bind(author.inserted_at.as_millis())
    .bind(author.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert author", e))?;

    Ok(())
}

/// Upserts a narrator by (source, id)
pub async fn upsert_narrator(
    executor: impl SqliteExecutor<'_>,
    narrator: &Narrator,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO narrators (id, source_id, person_id, name, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, id) DO UPDATE SET
            person_id = excluded.person_id,
            name = excluded.name,
            updated_at = excluded.updated_at
        WHERE excluded.updated_at > narrators.updated_at
        "#,
    )
    .bind(&narrator.id)
    .bind(narrator.source_id.as_str())
    .bind(&narrator.person_id)
    .bind(&narrator.name)
    .bind(narrator.inserted_at.as_millis())
    .bind(narrator.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert narrator", e))?;

    Ok(())
}

/// Upserts a book by (source, id)
pub async fn upsert_book(executor: impl SqliteExecutor<'_>, book: &Book) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO books (id, source_id, title, published, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, id) DO UPDATE SET
            title = excluded.title,
            published = excluded.published,
            updated_at = excluded.updated_at
        WHERE excluded.updated_at > books.updated_at
        "#,
    )
    .bind(&book.id)
    .bind(book.source_id.as_str())
    .bind(&book.title)
    .bind(book.published.map(|t| t.as_millis()))
    .bind(book.inserted_at.as_millis())
    .bind(book.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert book", e))?;

    Ok(())
}

/// Upserts a series by (source, id)
pub async fn upsert_series(
    executor: impl SqliteExecutor<'_>,
    series: &Series,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO series (id, source_id, name, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(source_id, id) DO UPDATE SET
            name = excluded.name,
            updated_at = excluded.updated_at
        WHERE excluded.updated_at > series.updated_at
        "#,
    )
    .bind(&series.id)
    .bind(series.source_id.as_str())
    .bind(&series.name)
    .bind(series.inserted_at.as_millis())
    .bind(series.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert series", e))?;

    Ok(())
}

/// Upserts a series-book membership by (source, id)
pub async fn upsert_series_book(
    executor: impl SqliteExecutor<'_>,
    series_book: &SeriesBook,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO series_books (id, source_id, book_id, series_id, book_number, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, id) DO UPDATE SET
            book_id = excluded.book_id,
            series_id = excluded.series_id,
            book_number = excluded.book_number,
            updated_at = excluded.updated_at
        WHERE excluded.updated_at > series_books.updated_at
        "#,
    )
    .bind(&series_book.id)
    .bind(series_book.source_id.as_str())
    .bind(&series_book.book_id)
    .bind(&series_book.series_id)
    .bind(&series_book.book_number)
    .bind(series_book.inserted_at.as_millis())
    .bind(series_book.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert series book", e))?;

    Ok(())
}

/// Upserts a book-author credit by (source, id)
pub async fn upsert_book_author(
    executor: impl SqliteExecutor<'_>,
    book_author: &BookAuthor,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO book_authors (id, source_id, author_id, book_id, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, id) DO UPDATE SET
            author_id = excluded.author_id,
            book_id = excluded.book_id,
            updated_at = excluded.updated_at
        WHERE excluded.updated_at > book_authors.updated_at
        "#,
    )
    .bind(&book_author.id)
    .bind(book_author.source_id.as_str())
    .bind(&book_author.author_id)
    .bind(&book_author.book_id)
    .bind(book_author.inserted_at.as_millis())
    .bind(book_author.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert book author", e))?;

    Ok(())
}

/// Upserts a media item by (source, id)
pub async fn upsert_media(
    executor: impl SqliteExecutor<'_>,
    media: &Media,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO media (id, source_id, book_id, duration_ms, abridged, published, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, id) DO UPDATE SET
            book_id = excluded.book_id,
            duration_ms = excluded.duration_ms,
            abridged = excluded.abridged,
            published = excluded.published,
            updated_at = excluded.updated_at
        WHERE excluded.updated_at > media.updated_at
        "#,
    )
    .bind(media.id.as_str())
    .bind(media.source_id.as_str())
    .bind(&media.book_id)
    .bind(media.duration.map(|d| d.as_millis() as i64))
    .bind(media.abridged as i64)
    .bind(media.published.map(|t| t.as_millis()))
    .bind(media.inserted_at.as_millis())
    .bind(media.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert media", e))?;

    Ok(())
}

/// Upserts a media-narrator credit by (source, id)
pub async fn upsert_media_narrator(
    executor: impl SqliteExecutor<'_>,
    media_narrator: &MediaNarrator,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO media_narrators (id, source_id, media_id, narrator_id, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, id) DO UPDATE SET
            media_id = excluded.media_id,
            narrator_id = excluded.narrator_id,
            updated_at = excluded.updated_at
        WHERE excluded.updated_at > media_narrators.updated_at
        "#,
    )
    .bind(&media_narrator.id)
    .bind(media_narrator.source_id.as_str())
    .bind(media_narrator.media_id.as_str())
    .bind(&media_narrator.narrator_id)
    .bind(media_narrator.inserted_at.as_millis())
    .bind(media_narrator.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert media narrator", e))?;

    Ok(())
}

/// Deletes one entity row by type; idempotent, cascades via foreign keys
pub async fn delete_entity(
    executor: impl SqliteExecutor<'_>,
    record_type: DeletableType,
    source_id: &SourceId,
    id: &str,
) -> Result<(), AppError> {
    let table = match record_type {
        DeletableType::Person => "people",
        DeletableType::Author => "authors",
        DeletableType::Narrator => "narrators",
        DeletableType::Book => "books",
        DeletableType::Series => "series",
        DeletableType::SeriesBook => "series_books",
        DeletableType::BookAuthor => "book_authors",
        DeletableType::Media => "media",
        DeletableType::MediaNarrator => "media_narrators",
    };

    sqlx::query(&format!(
        "DELETE FROM {} WHERE source_id = ? AND id = ?",
        table
    ))
    .bind(source_id.as_str())
    .bind(id)
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to delete from {}", table), e))?;

    Ok(())
}

/// Gets a person by (source, id)
pub async fn get_person(
    executor: impl SqliteExecutor<'_>,
    source_id: &SourceId,
    id: &str,
) -> Result<Person, AppError> {
    let row = sqlx::query(
        r#"
        SELECT id, source_id, name, description, image_path, inserted_at, updated_at
        FROM people WHERE source_id = ? AND id = ?
        "#,
    )
    .bind(source_id.as_str())
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch person", e))?
    .ok_or_else(|| AppError::RecordNotFound {
        entity: "Person".to_string(),
        identifier: id.to_string(),
    })?;

    Ok(Person {
        id: row
            .try_get("id")
            .map_err(|e| AppError::database("Missing person id", e))?,
        source_id: SourceId::new(
            row.try_get::<String, _>("source_id")
                .map_err(|e| AppError::database("Missing source id", e))?,
        ),
        name: row
            .try_get("name")
            .map_err(|e| AppError::database("Missing name", e))?,
        description: row.try_get("description").ok(),
        image_path: row.try_get("image_path").ok(),
        inserted_at: Timestamp::from_millis(
            row.try_get("inserted_at")
                .map_err(|e| AppError::database("Missing inserted_at", e))?,
        ),
        updated_at: Timestamp::from_millis(
            row.try_get("updated_at")
                .map_err(|e| AppError::database("Missing updated_at", e))?,
        ),
    })
}

/// Gets a book by (source, id)
pub async fn get_book(
    executor: impl SqliteExecutor<'_>,
    source_id: &SourceId,
    id: &str,
) -> Result<Book, AppError> {
    let row = sqlx::query(
        r#"
        SELECT id, source_id, title, published, inserted_at, updated_at
        FROM books WHERE source_id = ? AND id = ?
        "#,
    )
    .bind(source_id.as_str())
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch book", e))?
    .ok_or_else(|| AppError::RecordNotFound {
        entity: "Book".to_string(),
        identifier: id.to_string(),
    })?;

    Ok(Book {
        id: row
            .try_get("id")
            .map_err(|e| AppError::database("Missing book id", e))?,
        source_id: SourceId::new(
            row.try_get::<String, _>("source_id")
                .map_err(|e| AppError::database("Missing source id", e))?,
        ),
        title: row
            .try_get("title")
            .map_err(|e| AppError::database("Missing title", e))?,
        published: row
            .try_get::<Option<i64>, _>("published")
            .map_err(|e| AppError::database("Missing published", e))?
            .map(Timestamp::from_millis),
        inserted_at: Timestamp::from_millis(
            row.try_get("inserted_at")
                .map_err(|e| AppError::database("Missing inserted_at", e))?,
        ),
        updated_at: Timestamp::from_millis(
            row.try_get("updated_at")
                .map_err(|e| AppError::database("Missing updated_at", e))?,
        ),
    })
}

/// Gets a media item by (source, id)
pub async fn get_media(
    executor: impl SqliteExecutor<'_>,
    source_id: &SourceId,
    id: &MediaId,
) -> Result<Media, AppError> {
    let row = sqlx::query(
        r#"
        SELECT id, source_id, book_id, duration_ms, abridged, published, inserted_at, updated_at
        FROM media WHERE source_id = ? AND id = ?
        "#,
    )
    .bind(source_id.as_str())
    .bind(id.as_str())
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch media", e))?
    .ok_or_else(|| AppError::RecordNotFound {
        entity: "Media".to_string(),
        identifier: id.to_string(),
    })?;

    Ok(Media {
        id: MediaId::new(
            row.try_get::<String, _>("id")
                .map_err(|e| AppError::database("Missing media id", e))?,
        ),
        source_id: SourceId::new(
            row.try_get::<String, _>("source_id")
                .map_err(|e| AppError::database("Missing source id", e))?,
        ),
        book_id: row
            .try_get("book_id")
            .map_err(|e| AppError::database("Missing book id", e))?,
        duration: row
            .try_get::<Option<i64>, _>("duration_ms")
            .map_err(|e| AppError::database("Missing duration", e))?
            .map(|ms| Duration::from_millis(ms as u64)),
        abridged: row
            .try_get::<i64, _>("abridged")
            .map_err(|e| AppError::database("Missing abridged", e))?
            != 0,
        published: row
            .try_get::<Option<i64>, _>("published")
            .map_err(|e| AppError::database("Missing published", e))?
            .map(Timestamp::from_millis),
        inserted_at: Timestamp::from_millis(
            row.try_get("inserted_at")
                .map_err(|e| AppError::database("Missing inserted_at", e))?,
        ),
        updated_at: Timestamp::from_millis(
            row.try_get("updated_at")
                .map_err(|e| AppError::database("Missing updated_at", e))?,
        ),
    })
}

/// Counts rows in a library table for a source
pub async fn count_entities(
    executor: impl SqliteExecutor<'_>,
    record_type: DeletableType,
    source_id: &SourceId,
) -> Result<i64, AppError> {
    let table = match record_type {
        DeletableType::Person => "people",
        DeletableType::Author => "authors",
        DeletableType::Narrator => "narrators",
        DeletableType::Book => "books",
        DeletableType::Series => "series",
        DeletableType::SeriesBook => "series_books",
        DeletableType::BookAuthor => "book_authors",
        DeletableType::Media => "media",
        DeletableType::MediaNarrator => "media_narrators",
    };

    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE source_id = ?",
        table
    ))
    .bind(source_id.as_str())
    .fetch_one(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to count rows in {}", table), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use crate::migrations::run_migrations;
    use crate::DbPool;

    async fn setup() -> DbPool {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn source() -> SourceId {
        SourceId::new("server-1")
    }

    fn person_named(name: &str, updated_at: i64) -> Person {
        Person {
            id: "p1".to_string(),
            source_id: source(),
            name: name.to_string(),
            description: None,
            image_path: None,
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(updated_at),
        }
    }

    #[tokio::test]
    async fn test_upsert_person_insert_and_get() {
        let pool = setup().await;
        let person = person_named("John", 1000);

        upsert_person(&pool, &person).await.unwrap();

        let retrieved = get_person(&pool, &source(), "p1").await.unwrap();
        assert_eq!(retrieved.name, "John");
    }

    #[tokio::test]
    async fn test_upsert_person_newer_wins() {
        let pool = setup().await;
        upsert_person(&pool, &person_named("John", 1000))
            .await
            .unwrap();

        let mut updated = person_named("John Updated", 2000);
        updated.description = Some("A narrator of renown".to_string());
        upsert_person(&pool, &updated).await.unwrap();

        let retrieved = get_person(&pool, &source(), "p1").await.unwrap();
        assert_eq!(retrieved.name, "John Updated");
        assert_eq!(
            retrieved.description,
            Some("A narrator of renown".to_string())
        );
    }

    #[tokio::test]
    async fn test_upsert_person_stale_delta_ignored() {
        let pool = setup().await;
        upsert_person(&pool, &person_named("Current", 2000))
            .await
            .unwrap();

        // Older delta must not regress the row
        upsert_person(&pool, &person_named("Stale", 1500))
            .await
            .unwrap();

        let retrieved = get_person(&pool, &source(), "p1").await.unwrap();
        assert_eq!(retrieved.name, "Current");
        assert_eq!(retrieved.updated_at, Timestamp::from_millis(2000));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let pool = setup().await;
        let person = person_named("John", 1000);

        upsert_person(&pool, &person).await.unwrap();
        upsert_person(&pool, &person).await.unwrap();

        let count = count_entities(&pool, DeletableType::Person, &source())
            .await
            .unwrap();
        assert_eq!(count, 1);

        let retrieved = get_person(&pool, &source(), "p1").await.unwrap();
        assert_eq!(retrieved.updated_at, person.updated_at);
    }

    #[tokio::test]
    async fn test_delete_entity_cascades() {
        let pool = setup().await;
        upsert_person(&pool, &person_named("John", 1000))
            .await
            .unwrap();

        let author = Author {
            id: "a1".to_string(),
            source_id: source(),
            person_id: "p1".to_string(),
            name: "John".to_string(),
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(1000),
        };
        upsert_author(&pool, &author).await.unwrap();

        delete_entity(&pool, DeletableType::Person, &source(), "p1")
            .await
            .unwrap();

        let people = count_entities(&pool, DeletableType::Person, &source())
            .await
            .unwrap();
        let authors = count_entities(&pool, DeletableType::Author, &source())
            .await
            .unwrap();
        assert_eq!(people, 0);
        assert_eq!(authors, 0);
    }

    #[tokio::test]
    async fn test_delete_absent_entity_is_noop() {
        let pool = setup().await;

        delete_entity(&pool, DeletableType::Book, &source(), "missing")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_media_round_trip() {
        let pool = setup().await;
        let book = Book {
            id: "b1".to_string(),
            source_id: source(),
            title: "The Long Road".to_string(),
            published: None,
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(1000),
        };
        upsert_book(&pool, &book).await.unwrap();

        let media = Media {
            id: MediaId::new("m1"),
            source_id: source(),
            book_id: "b1".to_string(),
            duration: Some(Duration::from_seconds(7200)),
            abridged: false,
            published: Some(Timestamp::from_millis(500)),
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(1000),
        };
        upsert_media(&pool, &media).await.unwrap();

        let retrieved = get_media(&pool, &source(), &MediaId::new("m1"))
            .await
            .unwrap();
        assert_eq!(retrieved.duration, Some(Duration::from_seconds(7200)));
        assert_eq!(retrieved.book_id, "b1");
        assert!(!retrieved.abridged);
    }
}
