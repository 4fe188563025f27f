//! Playback history engine
//!
//! This crate owns the consistency-critical heart of TaleKeeper: the
//! append-only playback event log and everything derived from it.
//!
//! - Every mutating playback operation appends exactly one immutable event
//!   and rebuilds the owning playthrough aggregate in the same transaction.
//! - The aggregate is a strict read model: [`fold::fold_playthrough`] is the
//!   only thing that produces it.
//! - The [`heartbeat::PositionHeartbeat`] bounds crash loss by writing the
//!   player position into a non-authoritative state cache every few seconds,
//!   without touching the event log.

pub mod fold;
pub mod heartbeat;
pub mod player;
pub mod position;
pub mod recorder;

pub use fold::{apply_event, fold_playthrough, DEFAULT_RATE};
pub use heartbeat::{PositionHeartbeat, DEFAULT_PERIOD};
pub use player::{PlaybackHandle, PlayerProgress};
pub use position::{effective_position, update_state_cache, EffectivePosition, PositionSource};
pub use recorder::EventRecorder;
