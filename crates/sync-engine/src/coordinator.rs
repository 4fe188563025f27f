//! Sync coordinator
//!
//! The one entry point for "sync this source now". Rounds for the same
//! source are serialized with a per-source async lock; different sources
//! proceed in parallel. A round is library down-sync followed by event
//! up-sync, and the coordinator publishes a monotonically increasing data
//! version whenever a round actually changed local data, so the UI can
//! refresh without polling.

use crate::backend::{SessionHooks, SyncBackend};
use crate::down::{LibrarySyncEngine, SyncOutcome, DEFAULT_DEBOUNCE};
use crate::error::SyncResult;
use crate::up::{EventSyncEngine, UpSyncOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use talekeeper_core::{DeviceId, SourceId};
use talekeeper_database::DbPool;
use tokio::sync::watch;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Identifier stamped on events pushed from this installation
    pub device_id: DeviceId,
    /// Minimum spacing between down-sync rounds per source
    pub debounce: std::time::Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            device_id: DeviceId::new(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Result of one coordinated round
#[derive(Debug, Clone, Copy)]
pub struct SyncReport {
    pub down: SyncOutcome,
    pub up: UpSyncOutcome,
    /// Data version after this round
    pub data_version: u64,
}

/// Serializes sync rounds and publishes data-version changes
pub struct SyncCoordinator {
    down: LibrarySyncEngine,
    up: EventSyncEngine,
    version: watch::Sender<u64>,
    source_locks: Mutex<HashMap<SourceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncCoordinator {
    pub fn new(
        pool: DbPool,
        backend: Arc<dyn SyncBackend>,
        hooks: Arc<dyn SessionHooks>,
        config: SyncConfig,
    ) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            down: LibrarySyncEngine::new(pool.clone(), backend.clone(), hooks.clone())
                .with_debounce(config.debounce),
            up: EventSyncEngine::new(pool, backend, hooks, config.device_id),
            version,
            source_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Runs one full round for a source: library down, then events up
    ///
    /// Concurrent calls for the same source queue behind each other.
    pub async fn request_sync(&self, source_id: &SourceId) -> SyncResult<SyncReport> {
        let lock = self.lock_for(source_id);
        let guard = lock.lock().await;

        let result = self.run_round(source_id).await;

        drop(guard);
        self.release_lock(source_id);
        result
    }

    async fn run_round(&self, source_id: &SourceId) -> SyncResult<SyncReport> {
        let down = self.down.sync_down(source_id).await?;
        let up = self.up.sync_up(source_id).await?;

        if down.mutated() || up.accepted > 0 {
            self.version.send_modify(|v| *v += 1);
        }

        Ok(SyncReport {
            down,
            up,
            data_version: self.data_version(),
        })
    }

    /// Current data version; bumps only when a round changed local data
    pub fn data_version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Subscribes to data-version bumps
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn lock_for(&self, source_id: &SourceId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.source_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(source_id.clone()).or_default().clone()
    }

    /// Evicts the lock entry once no other round holds or awaits it
    ///
    /// The caller's own handle is still alive here, so a strong count of
    /// two means the map entry and this caller are the only references.
    fn release_lock(&self, source_id: &SourceId) {
        let mut locks = match self.source_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(entry) = locks.get(source_id) {
            if Arc::strong_count(entry) == 2 {
                locks.remove(source_id);
            }
        }
    }
}
