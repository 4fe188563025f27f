//! The playthrough fold
//!
//! Pure functions that rebuild a playthrough aggregate from its event log.
//! The aggregate row in the database is never edited directly; the recorder
//! appends an event and writes whatever this fold produces. Re-running the
//! fold on the same log always yields the same aggregate.

use talekeeper_core::{
    MediaId, PlaybackEvent, PlaybackEventType, Playthrough, PlaythroughStatus,
};

/// Default playback rate when no start or rate_change event has set one
pub const DEFAULT_RATE: f32 = 1.0;

/// Folds an event log into a playthrough aggregate
///
/// Events are sorted by (timestamp, id) before folding so the result does not
/// depend on the order the caller collected them in. Returns `None` for an
/// empty log.
pub fn fold_playthrough(media_id: &MediaId, events: &[PlaybackEvent]) -> Option<Playthrough> {
    if events.is_empty() {
        return None;
    }

    let mut ordered: Vec<&PlaybackEvent> = events.iter().collect();
    ordered.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.id.as_string().cmp(&b.id.as_string()))
    });

    let first = ordered[0];
    let mut aggregate = Playthrough {
        id: first.playthrough_id,
        source_id: first.source_id.clone(),
        media_id: media_id.clone(),
        status: PlaythroughStatus::InProgress,
        position: first.position,
        rate: first.playback_rate.unwrap_or(DEFAULT_RATE),
        started_at: first.timestamp,
        finished_at: None,
        abandoned_at: None,
        deleted_at: None,
        last_event_at: first.timestamp,
    };

    for event in ordered {
        apply_event(&mut aggregate, event);
    }

    Some(aggregate)
}

/// Applies one event to an aggregate
///
/// Tolerant of redundant transitions: a `resume` on an in-progress
/// playthrough or a repeated `finish` changes nothing it has not already
/// changed. Never panics on out-of-order input.
pub fn apply_event(aggregate: &mut Playthrough, event: &PlaybackEvent) {
    match event.event_type {
        PlaybackEventType::Start => {
            aggregate.position = event.position;
            if let Some(rate) = event.playback_rate {
                aggregate.rate = rate;
            }
        }
        PlaybackEventType::Play | PlaybackEventType::Pause => {
            aggregate.position = event.position;
        }
        PlaybackEventType::Seek => {
            aggregate.position = event.to_position.unwrap_or(event.position);
        }
        PlaybackEventType::RateChange => {
            aggregate.position = event.position;
            if let Some(rate) = event.playback_rate {
                aggregate.rate = rate;
            }
        }
        PlaybackEventType::Finish => {
            aggregate.position = event.position;
            aggregate.status = PlaythroughStatus::Finished;
            aggregate.finished_at = Some(event.timestamp);
        }
        PlaybackEventType::Abandon => {
            aggregate.position = event.position;
            aggregate.status = PlaythroughStatus::Abandoned;
            aggregate.abandoned_at = Some(event.timestamp);
        }
        PlaybackEventType::Resume => {
            // Position and rate are retained from the last known state
            if aggregate.status == PlaythroughStatus::Finished
                || aggregate.status == PlaythroughStatus::Abandoned
            {
                aggregate.status = PlaythroughStatus::InProgress;
                aggregate.finished_at = None;
                aggregate.abandoned_at = None;
            }
        }
        PlaybackEventType::Delete => {
            aggregate.status = PlaythroughStatus::Deleted;
            aggregate.deleted_at = Some(event.timestamp);
        }
    }

    if event.timestamp > aggregate.last_event_at {
        aggregate.last_event_at = event.timestamp;
    }
}
