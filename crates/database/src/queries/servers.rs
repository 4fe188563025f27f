//! Sync cursor database operations
//!
//! One row per remote source. `last_down_sync` records when we last asked
//! "what changed"; `new_data_as_of` records the frontier of data actually
//! observed and is what "changed since X" requests must use.

use sqlx::{Row, SqliteExecutor};
use talekeeper_core::{AppError, SourceId, SyncedServer, Timestamp};

/// Gets the cursor row for a source, if the source has ever synced
pub async fn get_synced_server(
    executor: impl SqliteExecutor<'_>,
    source_id: &SourceId,
) -> Result<Option<SyncedServer>, AppError> {
    let row = sqlx::query(
        "SELECT source_id, last_down_sync, new_data_as_of FROM synced_servers WHERE source_id = ?",
    )
    .bind(source_id.as_str())
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch sync cursor", e))?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(SyncedServer {
        source_id: SourceId::new(
            row.try_get::<String, _>("source_id")
                .map_err(|e| AppError::database("Missing source id", e))?,
        ),
        last_down_sync: row
            .try_get::<Option<i64>, _>("last_down_sync")
            .map_err(|e| AppError::database("Missing last_down_sync", e))?
            .map(Timestamp::from_millis),
        new_data_as_of: row
            .try_get::<Option<i64>, _>("new_data_as_of")
            .map_err(|e| AppError::database("Missing new_data_as_of", e))?
            .map(Timestamp::from_millis),
    }))
}

/// Writes the cursor row for a source
pub async fn upsert_synced_server(
    executor: impl SqliteExecutor<'_>,
    server: &SyncedServer,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO synced_servers (source_id, last_down_sync, new_data_as_of)
        VALUES (?, ?, ?)
        ON CONFLICT(source_id) DO UPDATE SET
            last_down_sync = excluded.last_down_sync,
            new_data_as_of = excluded.new_data_as_of
        "#,
    )
    .bind(server.source_id.as_str())
    .bind(server.last_down_sync.map(|t| t.as_millis()))
    .bind(server.new_data_as_of.map(|t| t.as_millis()))
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert sync cursor", e))?;

    Ok(())
}
