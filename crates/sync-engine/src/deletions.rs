//! Deletion processor
//!
//! Applies server-reported tombstones inside the caller's down-sync
//! transaction. Deleting an absent row is a no-op and child rows go with
//! their parents via foreign key cascades, so replaying a batch is safe.

use log::debug;
use sqlx::SqliteConnection;
use talekeeper_core::{AppError, DeletionRecord, SourceId};
use talekeeper_database::queries::library;

/// Removes every entity named by the tombstones, in order
pub async fn apply_deletions(
    conn: &mut SqliteConnection,
    source_id: &SourceId,
    deletions: &[DeletionRecord],
) -> Result<(), AppError> {
    for record in deletions {
        library::delete_entity(&mut *conn, record.record_type, source_id, &record.record_id)
            .await?;
        debug!(
            "deleted {} '{}' from {}",
            record.record_type, record.record_id, source_id
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use talekeeper_core::{DeletableType, Person, Timestamp};
    use talekeeper_database::queries::library::{count_entities, upsert_person};
    use talekeeper_database::{create_test_db, run_migrations};

    fn person(id: &str) -> Person {
        Person {
            id: id.to_string(),
            source_id: SourceId::new("server-1"),
            name: "Someone".to_string(),
            description: None,
            image_path: None,
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(1000),
        }
    }

    #[tokio::test]
    async fn test_applies_all_tombstones() {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let source = SourceId::new("server-1");

        upsert_person(&pool, &person("p1")).await.unwrap();
        upsert_person(&pool, &person("p2")).await.unwrap();

        let tombstones = vec![
            DeletionRecord {
                record_type: DeletableType::Person,
                record_id: "p1".to_string(),
                deleted_at: Timestamp::from_millis(2000),
            },
            DeletionRecord {
                record_type: DeletableType::Person,
                record_id: "p2".to_string(),
                deleted_at: Timestamp::from_millis(2000),
            },
        ];

        let mut conn = pool.acquire().await.unwrap();
        apply_deletions(&mut *conn, &source, &tombstones)
            .await
            .unwrap();
        drop(conn);

        let remaining = count_entities(&pool, DeletableType::Person, &source)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_absent_row_is_noop() {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let source = SourceId::new("server-1");

        let tombstones = vec![DeletionRecord {
            record_type: DeletableType::Book,
            record_id: "never-existed".to_string(),
            deleted_at: Timestamp::from_millis(2000),
        }];

        let mut conn = pool.acquire().await.unwrap();
        apply_deletions(&mut *conn, &source, &tombstones)
            .await
            .unwrap();
    }
}
