//! Playthrough state cache database operations
//!
//! Written by the position heartbeat every few seconds during playback.
//! Never writes an event; the event log stays the source of truth.

use sqlx::{Row, SqliteExecutor};
use talekeeper_core::{AppError, Duration, PlaythroughId, PlaythroughStateCache, Timestamp};

/// Upserts the cache row for a playthrough, bumping `updated_at`
pub async fn upsert_state_cache(
    executor: impl SqliteExecutor<'_>,
    playthrough_id: &PlaythroughId,
    position: Duration,
    rate: Option<f32>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO playthrough_state_cache (playthrough_id, position_ms, rate, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(playthrough_id) DO UPDATE SET
            position_ms = excluded.position_ms,
            rate = COALESCE(excluded.rate, playthrough_state_cache.rate),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(playthrough_id.as_string())
    .bind(position.as_millis() as i64)
    .bind(rate.map(|r| r as f64))
    .bind(Timestamp::now().as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to upsert state cache", e))?;

    Ok(())
}

/// Gets the cache row for a playthrough, if any
pub async fn get_state_cache(
    executor: impl SqliteExecutor<'_>,
    playthrough_id: &PlaythroughId,
) -> Result<Option<PlaythroughStateCache>, AppError> {
    let row = sqlx::query(
        r#"
        SELECT playthrough_id, position_ms, rate, updated_at
        FROM playthrough_state_cache WHERE playthrough_id = ?
        "#,
    )
    .bind(playthrough_id.as_string())
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch state cache", e))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id_str: String = row
        .try_get("playthrough_id")
        .map_err(|e| AppError::database("Missing playthrough id", e))?;

    Ok(Some(PlaythroughStateCache {
        playthrough_id: PlaythroughId::from_string(&id_str)?,
        position: Duration::from_millis(
            row.try_get::<i64, _>("position_ms")
                .map_err(|e| AppError::database("Missing position", e))? as u64,
        ),
        rate: row
            .try_get::<Option<f64>, _>("rate")
            .map_err(|e| AppError::database("Missing rate", e))?
            .map(|r| r as f32),
        updated_at: Timestamp::from_millis(
            row.try_get("updated_at")
                .map_err(|e| AppError::database("Missing updated_at", e))?,
        ),
    }))
}
