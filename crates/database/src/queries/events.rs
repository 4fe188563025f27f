//! Playback event log database operations
//!
//! The event log is append-only: rows are inserted once and the only
//! permitted mutation afterwards is stamping `synced_at` when the remote
//! source confirms receipt.

use sqlx::{Row, SqliteExecutor};
use talekeeper_core::{
    AppError, DeviceId, Duration, EventId, PlaybackEvent, PlaybackEventType, PlaythroughId,
    SourceId, Timestamp,
};

/// Appends one event to the log
pub async fn insert_event(
    executor: impl SqliteExecutor<'_>,
    event: &PlaybackEvent,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO playback_events (
            id, source_id, playthrough_id, event_type, timestamp, position_ms,
            from_position_ms, to_position_ms, playback_rate, previous_rate,
            device_id, synced_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.as_string())
    .bind(event.source_id.as_str())
    .bind(event.playthrough_id.as_string())
    .bind(event.event_type.as_str())
    .bind(event.timestamp.as_millis())
    .bind(event.position.as_millis() as i64)
    .bind(event.from_position.map(|d| d.as_millis() as i64))
    .bind(event.to_position.map(|d| d.as_millis() as i64))
    .bind(event.playback_rate.map(|r| r as f64))
    .bind(event.previous_rate.map(|r| r as f64))
    .bind(event.device_id.as_str())
    .bind(event.synced_at.map(|t| t.as_millis()))
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to insert playback event", e))?;

    Ok(())
}

/// Returns all events for a playthrough in fold order
///
/// Ordered by timestamp with the id as a deterministic tiebreak, so the fold
/// always sees the same sequence.
pub async fn events_for_playthrough(
    executor: impl SqliteExecutor<'_>,
    playthrough_id: &PlaythroughId,
) -> Result<Vec<PlaybackEvent>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT id, source_id, playthrough_id, event_type, timestamp, position_ms,
               from_position_ms, to_position_ms, playback_rate, previous_rate,
               device_id, synced_at
        FROM playback_events
        WHERE playthrough_id = ?
        ORDER BY timestamp, id
        "#,
    )
    .bind(playthrough_id.as_string())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch playback events", e))?;

    rows.into_iter().map(row_to_event).collect()
}

/// Returns all events for a source not yet confirmed by the remote
pub async fn unsynced_events(
    executor: impl SqliteExecutor<'_>,
    source_id: &SourceId,
) -> Result<Vec<PlaybackEvent>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT id, source_id, playthrough_id, event_type, timestamp, position_ms,
               from_position_ms, to_position_ms, playback_rate, previous_rate,
               device_id, synced_at
        FROM playback_events
        WHERE source_id = ? AND synced_at IS NULL
        ORDER BY timestamp, id
        "#,
    )
    .bind(source_id.as_str())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to fetch unsynced events", e))?;

    rows.into_iter().map(row_to_event).collect()
}

/// Stamps `synced_at` on the given events
///
/// Safe to call again for already-stamped ids; the up-sync protocol is
/// at-least-once and a re-stamp is harmless.
pub async fn mark_events_synced(
    executor: impl SqliteExecutor<'_>,
    ids: &[EventId],
    synced_at: Timestamp,
) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "UPDATE playback_events SET synced_at = ? WHERE id IN ({})",
        placeholders
    );

    let mut query = sqlx::query(&sql).bind(synced_at.as_millis());
    for id in ids {
        query = query.bind(id.as_string());
    }

    query
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to mark events synced", e))?;

    Ok(())
}

fn row_to_event(row: sqlx::sqlite::SqliteRow) -> Result<PlaybackEvent, AppError> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing event id", e))?;
    let playthrough_str: String = row
        .try_get("playthrough_id")
        .map_err(|e| AppError::database("Missing playthrough id", e))?;
    let type_str: String = row
        .try_get("event_type")
        .map_err(|e| AppError::database("Missing event type", e))?;

    Ok(PlaybackEvent {
        id: EventId::from_string(&id_str)?,
        source_id: SourceId::new(
            row.try_get::<String, _>("source_id")
                .map_err(|e| AppError::database("Missing source id", e))?,
        ),
        playthrough_id: PlaythroughId::from_string(&playthrough_str)?,
        event_type: PlaybackEventType::from_str(&type_str)?,
        timestamp: Timestamp::from_millis(
            row.try_get("timestamp")
                .map_err(|e| AppError::database("Missing timestamp", e))?,
        ),
        position: Duration::from_millis(
            row.try_get::<i64, _>("position_ms")
                .map_err(|e| AppError::database("Missing position", e))? as u64,
        ),
        from_position: row
            .try_get::<Option<i64>, _>("from_position_ms")
            .map_err(|e| AppError::database("Missing from position", e))?
            .map(|ms| Duration::from_millis(ms as u64)),
        to_position: row
            .try_get::<Option<i64>, _>("to_position_ms")
            .map_err(|e| AppError::database("Missing to position", e))?
            .map(|ms| Duration::from_millis(ms as u64)),
        playback_rate: row
            .try_get::<Option<f64>, _>("playback_rate")
            .map_err(|e| AppError::database("Missing playback rate", e))?
            .map(|r| r as f32),
        previous_rate: row
            .try_get::<Option<f64>, _>("previous_rate")
            .map_err(|e| AppError::database("Missing previous rate", e))?
            .map(|r| r as f32),
        device_id: DeviceId::from_string(
            row.try_get::<String, _>("device_id")
                .map_err(|e| AppError::database("Missing device id", e))?,
        ),
        synced_at: row
            .try_get::<Option<i64>, _>("synced_at")
            .map_err(|e| AppError::database("Missing synced_at", e))?
            .map(Timestamp::from_millis),
    })
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

    fn event_at(
        playthrough_id: PlaythroughId,
        event_type: PlaybackEventType,
        timestamp: i64,
    ) -> PlaybackEvent {
        let mut event = PlaybackEvent::new(
            SourceId::new("server-1"),
            playthrough_id,
            event_type,
            Duration::ZERO,
            DeviceId::from_string("device-1"),
        );
        event.timestamp = Timestamp::from_millis(timestamp);
        event
    }

    #[tokio::test]
    async fn test_insert_and_fetch_in_order() {
        let pool = setup().await;
        let pt = PlaythroughId::new();

        // Insert out of timestamp order
        insert_event(&pool, &event_at(pt, PlaybackEventType::Pause, 3000))
            .await
            .unwrap();
        insert_event(&pool, &event_at(pt, PlaybackEventType::Start, 1000))
            .await
            .unwrap();
        insert_event(&pool, &event_at(pt, PlaybackEventType::Play, 2000))
            .await
            .unwrap();

        let events = events_for_playthrough(&pool, &pt).await.unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                PlaybackEventType::Start,
                PlaybackEventType::Play,
                PlaybackEventType::Pause
            ]
        );
    }

    #[tokio::test]
    async fn test_seek_payload_round_trip() {
        let pool = setup().await;
        let pt = PlaythroughId::new();

        let event = event_at(pt, PlaybackEventType::Seek, 1000)
            .with_seek(Duration::ZERO, Duration::from_seconds(600))
            .with_rate(1.25);
        insert_event(&pool, &event).await.unwrap();

        let events = events_for_playthrough(&pool, &pt).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].to_position, Some(Duration::from_seconds(600)));
        assert_eq!(events[0].playback_rate, Some(1.25));
    }

    #[tokio::test]
    async fn test_unsynced_and_mark_synced() {
        let pool = setup().await;
        let source = SourceId::new("server-1");
        let pt = PlaythroughId::new();

        let e1 = event_at(pt, PlaybackEventType::Start, 1000);
        let e2 = event_at(pt, PlaybackEventType::Play, 2000);
        insert_event(&pool, &e1).await.unwrap();
        insert_event(&pool, &e2).await.unwrap();

        let unsynced = unsynced_events(&pool, &source).await.unwrap();
        assert_eq!(unsynced.len(), 2);

        mark_events_synced(&pool, &[e1.id], Timestamp::from_millis(5000))
            .await
            .unwrap();

        let unsynced = unsynced_events(&pool, &source).await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id, e2.id);
    }

    #[tokio::test]
    async fn test_mark_synced_twice_is_harmless() {
        let pool = setup().await;
        let pt = PlaythroughId::new();
        let event = event_at(pt, PlaybackEventType::Start, 1000);
        insert_event(&pool, &event).await.unwrap();

        mark_events_synced(&pool, &[event.id], Timestamp::from_millis(5000))
            .await
            .unwrap();
        mark_events_synced(&pool, &[event.id], Timestamp::from_millis(6000))
            .await
            .unwrap();

        let events = events_for_playthrough(&pool, &pt).await.unwrap();
        assert_eq!(events[0].synced_at, Some(Timestamp::from_millis(6000)));
    }

    #[tokio::test]
    async fn test_mark_synced_empty_is_noop() {
        let pool = setup().await;
        mark_events_synced(&pool, &[], Timestamp::now())
            .await
            .unwrap();
    }
}
