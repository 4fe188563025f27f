//! Playback event recorder
//!
//! Every mutating playback operation goes through here: one atomic
//! transaction appends exactly one immutable event and rewrites the owning
//! aggregate from the full fold of its log. A per-playthrough async lock
//! keeps two append-plus-rebuild operations from interleaving, and the
//! current aggregate is always read under that lock so event payloads
//! derived from it (previous rate, retained position) reflect the state
//! they were recorded against. The state cache heartbeat deliberately
//! bypasses this path and never touches the event log.

use crate::fold::fold_playthrough;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use talekeeper_core::{
    AppError, DeviceId, Duration, MediaId, PlaybackEvent, PlaybackEventType, Playthrough,
    PlaythroughId, SourceId,
};
use talekeeper_database::queries::{events, playthroughs};
use talekeeper_database::DbPool;

/// Records playback events and maintains playthrough aggregates
pub struct EventRecorder {
    pool: DbPool,
    device_id: DeviceId,
    locks: Mutex<HashMap<PlaythroughId, Arc<tokio::sync::Mutex<()>>>>,
}

impl EventRecorder {
    /// Creates a recorder stamping events with the given device id
    pub fn new(pool: DbPool, device_id: DeviceId) -> Self {
        Self {
            pool,
            device_id,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the device id stamped on recorded events
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Starts a new playthrough for a media item
    pub async fn record_start(
        &self,
        source_id: &SourceId,
        media_id: &MediaId,
        position: Duration,
        rate: f32,
    ) -> Result<Playthrough, AppError> {
        let playthrough_id = PlaythroughId::new();
        let event = PlaybackEvent::new(
            source_id.clone(),
            playthrough_id,
            PlaybackEventType::Start,
            position,
            self.device_id.clone(),
        )
        .with_rate(rate);

        debug!("recording start event for media {}", media_id);

        let lock = self.lock_for(playthrough_id);
        let guard = lock.lock().await;
        let result = self.append_locked(media_id, event).await;
        drop(guard);
        self.release_lock(&playthrough_id);
        result
    }

    /// Records that playback started or continued
    pub async fn record_play(
        &self,
        playthrough_id: &PlaythroughId,
        position: Duration,
    ) -> Result<Playthrough, AppError> {
        self.record_simple(playthrough_id, PlaybackEventType::Play, position)
            .await
    }

    /// Records that playback paused
    pub async fn record_pause(
        &self,
        playthrough_id: &PlaythroughId,
        position: Duration,
    ) -> Result<Playthrough, AppError> {
        self.record_simple(playthrough_id, PlaybackEventType::Pause, position)
            .await
    }

    /// Records a jump from one position to another
    pub async fn record_seek(
        &self,
        playthrough_id: &PlaythroughId,
        from: Duration,
        to: Duration,
    ) -> Result<Playthrough, AppError> {
        self.record_on_existing(playthrough_id, |existing| {
            PlaybackEvent::new(
                existing.source_id.clone(),
                *playthrough_id,
                PlaybackEventType::Seek,
                to,
                self.device_id.clone(),
            )
            .with_seek(from, to)
        })
        .await
    }

    /// Records a playback rate change
    pub async fn record_rate_change(
        &self,
        playthrough_id: &PlaythroughId,
        position: Duration,
        rate: f32,
    ) -> Result<Playthrough, AppError> {
        self.record_on_existing(playthrough_id, |existing| {
            PlaybackEvent::new(
                existing.source_id.clone(),
                *playthrough_id,
                PlaybackEventType::RateChange,
                position,
                self.device_id.clone(),
            )
            .with_rate_change(existing.rate, rate)
        })
        .await
    }

    /// Records that the listener finished the book
    pub async fn record_finish(
        &self,
        playthrough_id: &PlaythroughId,
        position: Duration,
    ) -> Result<Playthrough, AppError> {
        self.record_simple(playthrough_id, PlaybackEventType::Finish, position)
            .await
    }

    /// Records that the listener gave up on the book
    pub async fn record_abandon(
        &self,
        playthrough_id: &PlaythroughId,
        position: Duration,
    ) -> Result<Playthrough, AppError> {
        self.record_simple(playthrough_id, PlaybackEventType::Abandon, position)
            .await
    }

    /// Flips a finished or abandoned playthrough back to in-progress
    pub async fn record_resume(
        &self,
        playthrough_id: &PlaythroughId,
    ) -> Result<Playthrough, AppError> {
        self.record_on_existing(playthrough_id, |existing| {
            PlaybackEvent::new(
                existing.source_id.clone(),
                *playthrough_id,
                PlaybackEventType::Resume,
                existing.position,
                self.device_id.clone(),
            )
        })
        .await
    }

    /// Soft-deletes a playthrough; the event log is retained for sync
    pub async fn record_delete(
        &self,
        playthrough_id: &PlaythroughId,
    ) -> Result<Playthrough, AppError> {
        self.record_on_existing(playthrough_id, |existing| {
            PlaybackEvent::new(
                existing.source_id.clone(),
                *playthrough_id,
                PlaybackEventType::Delete,
                existing.position,
                self.device_id.clone(),
            )
        })
        .await
    }

    async fn record_simple(
        &self,
        playthrough_id: &PlaythroughId,
        event_type: PlaybackEventType,
        position: Duration,
    ) -> Result<Playthrough, AppError> {
        self.record_on_existing(playthrough_id, |existing| {
            PlaybackEvent::new(
                existing.source_id.clone(),
                *playthrough_id,
                event_type,
                position,
                self.device_id.clone(),
            )
        })
        .await
    }

    /// Loads the aggregate under the playthrough's lock, builds the event
    /// against it, then appends and rebuilds in one transaction
    async fn record_on_existing<F>(
        &self,
        playthrough_id: &PlaythroughId,
        build: F,
    ) -> Result<Playthrough, AppError>
    where
        F: FnOnce(&Playthrough) -> PlaybackEvent,
    {
        let lock = self.lock_for(*playthrough_id);
        let guard = lock.lock().await;

        let result = match playthroughs::get_playthrough(&self.pool, playthrough_id).await {
            Ok(existing) => {
                let event = build(&existing);
                self.append_locked(&existing.media_id, event).await
            }
            Err(e) => Err(e),
        };

        drop(guard);
        self.release_lock(playthrough_id);
        result
    }

    /// Appends one event and rewrites the aggregate, atomically
    ///
    /// The caller must hold the playthrough's lock.
    async fn append_locked(
        &self,
        media_id: &MediaId,
        event: PlaybackEvent,
    ) -> Result<Playthrough, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to begin transaction", e))?;

        events::insert_event(&mut *tx, &event).await?;

        let log = events::events_for_playthrough(&mut *tx, &event.playthrough_id).await?;
        let aggregate = fold_playthrough(media_id, &log)
            .ok_or_else(|| AppError::internal("Event log empty immediately after append"))?;

        playthroughs::upsert_playthrough(&mut *tx, &aggregate).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit event transaction", e))?;

        debug!(
            "recorded {} event for playthrough {}",
            event.event_type, event.playthrough_id
        );
        Ok(aggregate)
    }

    fn lock_for(&self, playthrough_id: PlaythroughId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(playthrough_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Evicts the lock entry once no other operation holds or awaits it
    ///
    /// The caller's own handle is still alive here, so a strong count of
    /// two means the map entry and this caller are the only references.
    fn release_lock(&self, playthrough_id: &PlaythroughId) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = locks.get(playthrough_id) {
            if Arc::strong_count(entry) == 2 {
                locks.remove(playthrough_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talekeeper_core::PlaythroughStatus;
    use talekeeper_database::queries::library;
    use talekeeper_database::{create_test_db, run_migrations};
    use talekeeper_core::{Book, Media, Timestamp};

    async fn setup() -> (DbPool, EventRecorder, SourceId, MediaId) {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let source = SourceId::new("server-1");
        let book = Book {
            id: "b1".to_string(),
            source_id: source.clone(),
            title: "Test Book".to_string(),
            published: None,
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(1000),
        };
        library::upsert_book(&pool, &book).await.unwrap();

        let media = Media {
            id: MediaId::new("m1"),
            source_id: source.clone(),
            book_id: "b1".to_string(),
            duration: Some(Duration::from_seconds(3600)),
            abridged: false,
            published: None,
            inserted_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(1000),
        };
        library::upsert_media(&pool, &media).await.unwrap();

        let recorder = EventRecorder::new(pool.clone(), DeviceId::from_string("device-1"));
        (pool, recorder, source, MediaId::new("m1"))
    }

    #[tokio::test]
    async fn test_start_creates_playthrough() {
        let (pool, recorder, source, media) = setup().await;

        let pt = recorder
            .record_start(&source, &media, Duration::ZERO, 1.0)
            .await
            .unwrap();

        assert_eq!(pt.status, PlaythroughStatus::InProgress);
        assert_eq!(pt.position, Duration::ZERO);

        let stored = playthroughs::get_playthrough(&pool, &pt.id).await.unwrap();
        assert_eq!(stored, pt);

        let log = events::events_for_playthrough(&pool, &pt.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event_type, PlaybackEventType::Start);
    }

    #[tokio::test]
    async fn test_seek_then_finish_then_resume() {
        let (_pool, recorder, source, media) = setup().await;

        let pt = recorder
            .record_start(&source, &media, Duration::ZERO, 1.0)
            .await
            .unwrap();

        let pt = recorder
            .record_seek(&pt.id, Duration::ZERO, Duration::from_seconds(600))
            .await
            .unwrap();
        assert_eq!(pt.position, Duration::from_seconds(600));

        let pt = recorder
            .record_finish(&pt.id, Duration::from_seconds(600))
            .await
            .unwrap();
        assert_eq!(pt.status, PlaythroughStatus::Finished);
        assert!(pt.finished_at.is_some());

        let pt = recorder.record_resume(&pt.id).await.unwrap();
        assert_eq!(pt.status, PlaythroughStatus::InProgress);
        assert_eq!(pt.position, Duration::from_seconds(600));
    }

    #[tokio::test]
    async fn test_aggregate_equals_full_fold() {
        let (pool, recorder, source, media) = setup().await;

        let pt = recorder
            .record_start(&source, &media, Duration::ZERO, 1.0)
            .await
            .unwrap();
        recorder
            .record_play(&pt.id, Duration::from_seconds(30))
            .await
            .unwrap();
        recorder
            .record_rate_change(&pt.id, Duration::from_seconds(60), 1.5)
            .await
            .unwrap();
        let last = recorder
            .record_pause(&pt.id, Duration::from_seconds(90))
            .await
            .unwrap();

        let log = events::events_for_playthrough(&pool, &pt.id).await.unwrap();
        let refolded = fold_playthrough(&media, &log).unwrap();
        assert_eq!(refolded, last);
        assert_eq!(refolded.rate, 1.5);
        assert_eq!(refolded.position, Duration::from_seconds(90));
    }

    #[tokio::test]
    async fn test_delete_is_soft() {
        let (pool, recorder, source, media) = setup().await;

        let pt = recorder
            .record_start(&source, &media, Duration::ZERO, 1.0)
            .await
            .unwrap();
        let deleted = recorder.record_delete(&pt.id).await.unwrap();

        assert_eq!(deleted.status, PlaythroughStatus::Deleted);
        assert!(deleted.deleted_at.is_some());

        // Excluded from default lists, events retained for up-sync
        let listed = playthroughs::list_playthroughs(&pool, &source)
            .await
            .unwrap();
        assert!(listed.is_empty());

        let log = events::events_for_playthrough(&pool, &pt.id).await.unwrap();
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_recording_on_missing_playthrough_fails() {
        let (_pool, recorder, _source, _media) = setup().await;

        let result = recorder
            .record_play(&PlaythroughId::new(), Duration::ZERO)
            .await;
        assert!(matches!(result, Err(AppError::RecordNotFound { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_events_serialize_per_playthrough() {
        let (pool, recorder, source, media) = setup().await;
        let recorder = Arc::new(recorder);

        let pt = recorder
            .record_start(&source, &media, Duration::ZERO, 1.0)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 1..=10u64 {
            let recorder = recorder.clone();
            let id = pt.id;
            handles.push(tokio::spawn(async move {
                recorder
                    .record_play(&id, Duration::from_seconds(i * 10))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let log = events::events_for_playthrough(&pool, &pt.id).await.unwrap();
        assert_eq!(log.len(), 11);

        let stored = playthroughs::get_playthrough(&pool, &pt.id).await.unwrap();
        let refolded = fold_playthrough(&media, &log).unwrap();
        assert_eq!(stored, refolded);

        assert!(recorder.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_rate_changes_chain_previous_rate() {
        let (pool, recorder, source, media) = setup().await;
        let recorder = Arc::new(recorder);

        let pt = recorder
            .record_start(&source, &media, Duration::ZERO, 1.0)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for rate in [1.5f32, 2.0] {
            let recorder = recorder.clone();
            let id = pt.id;
            handles.push(tokio::spawn(async move {
                recorder
                    .record_rate_change(&id, Duration::from_seconds(10), rate)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let log = events::events_for_playthrough(&pool, &pt.id).await.unwrap();
        let changes: Vec<_> = log
            .iter()
            .filter(|e| e.event_type == PlaybackEventType::RateChange)
            .collect();
        assert_eq!(changes.len(), 2);

        // Whichever ran second must have read the other's new rate, not the
        // initial 1.0 both would see without serialized reads
        let first = changes
            .iter()
            .find(|e| e.previous_rate == Some(1.0))
            .expect("exactly one change starts from the initial rate");
        let second = changes.iter().find(|e| e.id != first.id).unwrap();
        assert_eq!(second.previous_rate, first.playback_rate);
    }

    #[tokio::test]
    async fn test_lock_map_is_drained_after_operations() {
        let (_pool, recorder, source, media) = setup().await;

        let pt = recorder
            .record_start(&source, &media, Duration::ZERO, 1.0)
            .await
            .unwrap();
        recorder
            .record_play(&pt.id, Duration::from_seconds(5))
            .await
            .unwrap();
        recorder
            .record_finish(&pt.id, Duration::from_seconds(5))
            .await
            .unwrap();

        assert!(recorder.locks.lock().unwrap().is_empty());
    }
}
