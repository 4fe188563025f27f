//! Playback engine boundary
//!
//! The audio engine itself lives outside this crate. The recorder and the
//! position heartbeat only need these primitives.

use talekeeper_core::Duration;

/// A snapshot of the player's current progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerProgress {
    pub position: Duration,
    pub duration: Option<Duration>,
}

/// Handle to the external playback engine
pub trait PlaybackHandle: Send + Sync {
    /// Returns the current position and total duration
    fn progress(&self) -> PlayerProgress;

    /// Starts or resumes playback
    fn play(&self);

    /// Pauses playback
    fn pause(&self);

    /// Seeks to a position
    fn seek_to(&self, position: Duration);

    /// Sets the playback rate
    fn set_rate(&self, rate: f32);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Scriptable player for tests; position advances only via `set_position`
    pub struct FakePlayer {
        position_ms: AtomicU64,
    }

    impl FakePlayer {
        pub fn new(position: Duration) -> Self {
            Self {
                position_ms: AtomicU64::new(position.as_millis()),
            }
        }

        pub fn set_position(&self, position: Duration) {
            self.position_ms.store(position.as_millis(), Ordering::SeqCst);
        }
    }

    impl PlaybackHandle for FakePlayer {
        fn progress(&self) -> PlayerProgress {
            PlayerProgress {
                position: Duration::from_millis(self.position_ms.load(Ordering::SeqCst)),
                duration: Some(Duration::from_seconds(3600)),
            }
        }

        fn play(&self) {}
        fn pause(&self) {}
        fn seek_to(&self, position: Duration) {
            self.set_position(position);
        }
        fn set_rate(&self, _rate: f32) {}
    }
}
