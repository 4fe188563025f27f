//! Playback event log types
//!
//! Events are immutable and append-only. Once written, the only field that
//! ever changes is `synced_at`, stamped when the remote source confirms
//! receipt. All playthrough state is derived by folding events in timestamp
//! order; nothing else is authoritative.

use crate::error::AppError;
use crate::types::{DeviceId, Duration, EventId, PlaythroughId, SourceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of playback activity an event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEventType {
    /// A new playthrough began
    Start,
    /// Playback started or continued
    Play,
    /// Playback paused
    Pause,
    /// The listener jumped to a different position
    Seek,
    /// The playback rate changed
    RateChange,
    /// The listener finished the book
    Finish,
    /// The listener gave up on the book
    Abandon,
    /// A finished or abandoned playthrough was picked back up
    Resume,
    /// The playthrough was soft-deleted
    Delete,
}

impl PlaybackEventType {
    /// Returns the stable string form used in the database and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Seek => "seek",
            Self::RateChange => "rate_change",
            Self::Finish => "finish",
            Self::Abandon => "abandon",
            Self::Resume => "resume",
            Self::Delete => "delete",
        }
    }

    /// Parses the stable string form
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "start" => Ok(Self::Start),
            "play" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "seek" => Ok(Self::Seek),
            "rate_change" => Ok(Self::RateChange),
            "finish" => Ok(Self::Finish),
            "abandon" => Ok(Self::Abandon),
            "resume" => Ok(Self::Resume),
            "delete" => Ok(Self::Delete),
            other => Err(AppError::InvalidArgument {
                argument: "event_type".to_string(),
                reason: format!("unknown event type '{}'", other),
            }),
        }
    }
}

impl fmt::Display for PlaybackEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable entry in the playback event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    /// Client-generated, globally unique
    pub id: EventId,
    pub source_id: SourceId,
    pub playthrough_id: PlaythroughId,
    pub event_type: PlaybackEventType,
    /// When the activity happened, client clock
    pub timestamp: Timestamp,
    /// Playback position when the event was recorded
    pub position: Duration,
    /// Seek origin (seek events only)
    pub from_position: Option<Duration>,
    /// Seek target (seek events only)
    pub to_position: Option<Duration>,
    /// New rate (start and rate_change events)
    pub playback_rate: Option<f32>,
    /// Rate before the change (rate_change events only)
    pub previous_rate: Option<f32>,
    pub device_id: DeviceId,
    /// Set once the remote source has confirmed this event
    pub synced_at: Option<Timestamp>,
}

impl PlaybackEvent {
    /// Creates an event with a fresh id and the current time, unsynced
    pub fn new(
        source_id: SourceId,
        playthrough_id: PlaythroughId,
        event_type: PlaybackEventType,
        position: Duration,
        device_id: DeviceId,
    ) -> Self {
        Self {
            id: EventId::new(),
            source_id,
            playthrough_id,
            event_type,
            timestamp: Timestamp::now(),
            position,
            from_position: None,
            to_position: None,
            playback_rate: None,
            previous_rate: None,
            device_id,
            synced_at: None,
        }
    }

    /// Sets the seek payload
    pub fn with_seek(mut self, from: Duration, to: Duration) -> Self {
        self.from_position = Some(from);
        self.to_position = Some(to);
        self
    }

    /// Sets the playback rate payload
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.playback_rate = Some(rate);
        self
    }

    /// Sets the rate-change payload, old rate and new
    pub fn with_rate_change(mut self, previous: f32, rate: f32) -> Self {
        self.previous_rate = Some(previous);
        self.playback_rate = Some(rate);
        self
    }

    /// Returns true if the remote source has confirmed this event
    pub fn is_synced(&self) -> bool {
        self.synced_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_string_round_trip() {
        let all = [
            PlaybackEventType::Start,
            PlaybackEventType::Play,
            PlaybackEventType::Pause,
            PlaybackEventType::Seek,
            PlaybackEventType::RateChange,
            PlaybackEventType::Finish,
            PlaybackEventType::Abandon,
            PlaybackEventType::Resume,
            PlaybackEventType::Delete,
        ];
        for ty in all {
            assert_eq!(PlaybackEventType::from_str(ty.as_str()).unwrap(), ty);
        }
    }

    #[test]
    fn test_event_type_rejects_unknown() {
        assert!(PlaybackEventType::from_str("rewind").is_err());
    }

    #[test]
    fn test_new_event_is_unsynced() {
        let event = PlaybackEvent::new(
            SourceId::new("server-1"),
            PlaythroughId::new(),
            PlaybackEventType::Play,
            Duration::from_seconds(30),
            DeviceId::new(),
        );
        assert!(!event.is_synced());
        assert!(event.from_position.is_none());
    }

    #[test]
    fn test_rate_change_payload() {
        let event = PlaybackEvent::new(
            SourceId::new("server-1"),
            PlaythroughId::new(),
            PlaybackEventType::RateChange,
            Duration::from_seconds(90),
            DeviceId::new(),
        )
        .with_rate_change(1.0, 1.5);

        assert_eq!(event.previous_rate, Some(1.0));
        assert_eq!(event.playback_rate, Some(1.5));
    }

    #[test]
    fn test_seek_payload() {
        let event = PlaybackEvent::new(
            SourceId::new("server-1"),
            PlaythroughId::new(),
            PlaybackEventType::Seek,
            Duration::from_seconds(600),
            DeviceId::new(),
        )
        .with_seek(Duration::ZERO, Duration::from_seconds(600));

        assert_eq!(event.from_position, Some(Duration::ZERO));
        assert_eq!(event.to_position, Some(Duration::from_seconds(600)));
    }
}
