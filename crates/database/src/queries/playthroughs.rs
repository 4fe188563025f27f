//! Playthrough aggregate database operations
//!
//! The aggregate row is a read model: only the event recorder's fold writes
//! it. Default reads exclude soft-deleted playthroughs.

use sqlx::{Row, SqliteExecutor};
use talekeeper_core::{
    AppError, Duration, MediaId, Playthrough, PlaythroughId, PlaythroughStatus, SourceId,
    Timestamp,
};

/// Writes the aggregate row produced by the fold
pub async fn upsert_playthrough(
    executor: impl SqliteExecutor<'_>,
    playthrough: &Playthrough,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO playthroughs (
            id, source_id, media_id, status, position_ms, rate,
            started_at, finished_at, abandoned_at, deleted_at, last_event_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            position_ms = excluded.position_ms,
            rate = excluded.rate,
            started_at = excluded.started_at,
            finished_at = excluded.finished_at,
            abandoned_at = excluded.abandoned_at,
            deleted_at = excluded.deleted_at,
            last_event_at = excluded.last_event_at
        "#,
    )
    .bind(playthrough.id.as_string())
    .bind(playthrough.source_id.as_str())
    .bind(playthrough.media_id.as_str())
    .bind(playthrough.status.as_str())
    .bind(playthrough.position.as_millis() as i64)
    .bind(playthrough.rate as f64)
    .bind(playthrough.started_at.as_millis())
    .bind(playthrough.finished_at.map(|t| t.as_millis()))
    .bind(playthrough.abandoned_at.map(|t| t.as_millis()))
    .bind(playthrough.deleted_at.map(|t| t.as_millis()))
    .bind(playthrough.last_event_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert playthrough", e))?;

    Ok(())
}

/// Gets a playthrough by id, including soft-deleted ones
pub async fn get_playthrough(
    executor: impl SqliteExecutor<'_>,
    id: &PlaythroughId,
) -> Result<Playthrough, AppError> {
    let row = sqlx::query(
        r#"
        SELECT id, source_id, media_id, status, position_ms, rate,
               started_at, finished_at, abandoned_at, deleted_at, last_event_at
        FROM playthroughs WHERE id = ?
        "#,
    )
    .bind(id.as_string())
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch playthrough", e))?
    .ok_or_else(|| AppError::RecordNotFound {
        entity: "Playthrough".to_string(),
        identifier: id.to_string(),
    })?;

    row_to_playthrough(row)
}

/// Lists playthroughs for a source, excluding soft-deleted
pub async fn list_playthroughs(
    executor: impl SqliteExecutor<'_>,
    source_id: &SourceId,
) -> Result<Vec<Playthrough>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT id, source_id, media_id, status, position_ms, rate,
               started_at, finished_at, abandoned_at, deleted_at, last_event_at
        FROM playthroughs
        WHERE source_id = ? AND deleted_at IS NULL
        ORDER BY last_event_at DESC
        "#,
    )
    .bind(source_id.as_str())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to list playthroughs", e))?;

    rows.into_iter().map(row_to_playthrough).collect()
}

/// Lists in-progress playthroughs for a source, most recent activity first
pub async fn in_progress_playthroughs(
    executor: impl SqliteExecutor<'_>,
    source_id: &SourceId,
) -> Result<Vec<Playthrough>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT id, source_id, media_id, status, position_ms, rate,
               started_at, finished_at, abandoned_at, deleted_at, last_event_at
        FROM playthroughs
        WHERE source_id = ? AND status = 'in_progress' AND deleted_at IS NULL
        ORDER BY last_event_at DESC
        "#,
    )
    .bind(source_id.as_str())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to list in-progress playthroughs", e))?;

    rows.into_iter().map(row_to_playthrough).collect()
}

/// Lists finished playthroughs for a source, most recently finished first
pub async fn finished_playthroughs(
    executor: impl SqliteExecutor<'_>,
    source_id: &SourceId,
) -> Result<Vec<Playthrough>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT id, source_id, media_id, status, position_ms, rate,
               started_at, finished_at, abandoned_at, deleted_at, last_event_at
        FROM playthroughs
        WHERE source_id = ? AND status = 'finished' AND deleted_at IS NULL
        ORDER BY finished_at DESC
        "#,
    )
    .bind(source_id.as_str())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to list finished playthroughs", e))?;

    rows.into_iter().map(row_to_playthrough).collect()
}

/// Finds the playthrough to show for a media item
///
/// Duplicate in-progress rows can exist after migrations from older installs.
/// They are not merged: the one with the latest `last_event_at` wins.
pub async fn latest_playthrough_for_media(
    executor: impl SqliteExecutor<'_>,
    source_id: &SourceId,
    media_id: &MediaId,
) -> Result<Option<Playthrough>, AppError> {
    let row = sqlx::query(
        r#"
        SELECT id, source_id, media_id, status, position_ms, rate,
               started_at, finished_at, abandoned_at, deleted_at, last_event_at
        FROM playthroughs
        WHERE source_id = ? AND media_id = ? AND deleted_at IS NULL
        ORDER BY
            CASE status WHEN 'in_progress' THEN 0 ELSE 1 END,
            last_event_at DESC,
            finished_at DESC,
            abandoned_at DESC
        LIMIT 1
        "#,
    )
    .bind(source_id.as_str())
    .bind(media_id.as_str())
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch playthrough for media", e))?;

    row.map(row_to_playthrough).transpose()
}

fn row_to_playthrough(row: sqlx::sqlite::SqliteRow) -> Result<Playthrough, AppError> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing playthrough id", e))?;
    let status_str: String = row
        .try_get("status")
        .map_err(|e| AppError::database("Missing status", e))?;

    Ok(Playthrough {
        id: PlaythroughId::from_string(&id_str)?,
        source_id: SourceId::new(
            row.try_get::<String, _>("source_id")
                .map_err(|e| AppError::database("Missing source id", e))?,
        ),
        media_id: MediaId::new(
            row.try_get::<String, _>("media_id")
                .map_err(|e| AppError::database("Missing media id", e))?,
        ),
        status: PlaythroughStatus::from_str(&status_str)?,
        position: Duration::from_millis(
            row.try_get::<i64, _>("position_ms")
                .map_err(|e| AppError::database("Missing position", e))? as u64,
        ),
        rate: row
            .try_get::<f64, _>("rate")
            .map_err(|e| AppError::database("Missing rate", e))? as f32,
        started_at: Timestamp::from_millis(
            row.try_get("started_at")
                .map_err(|e| AppError::database("Missing started_at", e))?,
        ),
        finished_at: row
            .try_get::<Option<i64>, _>("finished_at")
            .map_err(|e| AppError::database("Missing finished_at", e))?
            .map(Timestamp::from_millis),
        abandoned_at: row
            .try_get::<Option<i64>, _>("abandoned_at")
            .map_err(|e| AppError::database("Missing abandoned_at", e))?
            .map(Timestamp::from_millis),
        deleted_at: row
            .try_get::<Option<i64>, _>("deleted_at")
            .map_err(|e| AppError::database("Missing deleted_at", e))?
            .map(Timestamp::from_millis),
        last_event_at: Timestamp::from_millis(
            row.try_get("last_event_at")
                .map_err(|e| AppError::database("Missing last_event_at", e))?,
        ),
    })
}
