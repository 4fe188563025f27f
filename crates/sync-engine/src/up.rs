//! Playback event up-sync
//!
//! Pushes every unsynced event for a source and stamps `synced_at` on the
//! ones the server acknowledged. Delivery is at-least-once: anything not
//! acknowledged stays unsynced and is pushed again next round, and the
//! server deduplicates by event id.

use crate::backend::{SessionHooks, SyncBackend};
use crate::error::{SyncError, SyncResult};
use crate::protocol::EventPushRequest;
use log::{debug, info, warn};
use std::sync::Arc;
use talekeeper_core::{DeviceId, SourceId, Timestamp};
use talekeeper_database::queries::{events, servers};
use talekeeper_database::DbPool;

/// What an up-sync round did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpSyncOutcome {
    /// Events sent to the server
    pub pushed: usize,
    /// Events the server acknowledged
    pub accepted: usize,
}

impl UpSyncOutcome {
    /// A round that had nothing to push
    pub const NOOP: UpSyncOutcome = UpSyncOutcome {
        pushed: 0,
        accepted: 0,
    };
}

/// Pushes the local event log up to a remote source
pub struct EventSyncEngine {
    pool: DbPool,
    backend: Arc<dyn SyncBackend>,
    hooks: Arc<dyn SessionHooks>,
    device_id: DeviceId,
}

impl EventSyncEngine {
    pub fn new(
        pool: DbPool,
        backend: Arc<dyn SyncBackend>,
        hooks: Arc<dyn SessionHooks>,
        device_id: DeviceId,
    ) -> Self {
        Self {
            pool,
            backend,
            hooks,
            device_id,
        }
    }

    /// Runs one up-sync round for a source
    pub async fn sync_up(&self, source_id: &SourceId) -> SyncResult<UpSyncOutcome> {
        let unsynced = events::unsynced_events(&self.pool, source_id).await?;
        if unsynced.is_empty() {
            debug!("no unsynced events for {}", source_id);
            return Ok(UpSyncOutcome::NOOP);
        }

        let cursor = servers::get_synced_server(&self.pool, source_id).await?;
        let pushed = unsynced.len();
        let request = EventPushRequest {
            source_id: source_id.clone(),
            device_id: self.device_id.clone(),
            events: unsynced,
            last_synced_at: cursor
                .and_then(|c| c.last_down_sync)
                .map(|t| t.to_datetime()),
        };

        let response = match self.backend.push_events(&request).await {
            Err(SyncError::Unauthorized(message)) => {
                warn!("source {} rejected our session", source_id);
                self.hooks.force_sign_out(source_id);
                return Err(SyncError::Unauthorized(message));
            }
            other => other?,
        };

        let accepted = response.accepted.len();
        events::mark_events_synced(
            &self.pool,
            &response.accepted,
            Timestamp::from(response.server_time),
        )
        .await?;

        info!(
            "up-sync for {}: pushed {}, accepted {}",
            source_id, pushed, accepted
        );
        Ok(UpSyncOutcome { pushed, accepted })
    }
}
