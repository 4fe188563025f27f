//! Effective position reads
//!
//! The heartbeat writes the state cache far more often than events are
//! logged, so the freshest known position may live in either place. The rule:
//! the cache wins only when it is strictly newer than the aggregate's
//! `last_event_at`; on a tie the aggregate wins, because the cache is a
//! performance hint, not authoritative.

use talekeeper_core::{AppError, Duration, PlaythroughId};
use talekeeper_database::queries::{playthroughs, state_cache};
use talekeeper_database::DbPool;

/// Where an effective position came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    /// The playthrough aggregate (folded from the event log)
    Aggregate,
    /// The heartbeat-written state cache
    Cache,
}

/// The freshest known position and rate for a playthrough
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePosition {
    pub position: Duration,
    pub rate: f32,
    pub source: PositionSource,
}

/// Writes the latest heartbeat position into the state cache
///
/// Never writes an event; crash loss is bounded by the heartbeat period.
pub async fn update_state_cache(
    pool: &DbPool,
    playthrough_id: &PlaythroughId,
    position: Duration,
    rate: Option<f32>,
) -> Result<(), AppError> {
    state_cache::upsert_state_cache(pool, playthrough_id, position, rate).await
}

/// Returns the position to display for a playthrough
pub async fn effective_position(
    pool: &DbPool,
    playthrough_id: &PlaythroughId,
) -> Result<EffectivePosition, AppError> {
    let playthrough = playthroughs::get_playthrough(pool, playthrough_id).await?;
    let cache = state_cache::get_state_cache(pool, playthrough_id).await?;

    match cache {
        Some(cache) if cache.updated_at > playthrough.last_event_at => Ok(EffectivePosition {
            position: cache.position,
            rate: cache.rate.unwrap_or(playthrough.rate),
            source: PositionSource::Cache,
        }),
        _ => Ok(EffectivePosition {
            position: playthrough.position,
            rate: playthrough.rate,
            source: PositionSource::Aggregate,
        }),
    }
}
