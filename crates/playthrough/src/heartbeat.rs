//! Position heartbeat
//!
//! A cancellable periodic timer that copies the player's current position
//! into the state cache while something is playing. It writes only the cache,
//! never the event log, so it cannot race an event-append for the same
//! playthrough. All lifecycle state is owned by the struct; there are no
//! process-wide flags.

use crate::player::PlaybackHandle;
use crate::position::update_state_cache;
use log::{debug, warn};
use std::sync::Arc;
use talekeeper_core::PlaythroughId;
use talekeeper_database::DbPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default heartbeat period
pub const DEFAULT_PERIOD: std::time::Duration = std::time::Duration::from_secs(5);

/// Periodic writer of player position into the state cache
pub struct PositionHeartbeat {
    pool: DbPool,
    handle: Arc<dyn PlaybackHandle>,
    period: std::time::Duration,
    running: Option<RunningBeat>,
}

struct RunningBeat {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PositionHeartbeat {
    /// Creates a stopped heartbeat
    pub fn new(pool: DbPool, handle: Arc<dyn PlaybackHandle>, period: std::time::Duration) -> Self {
        Self {
            pool,
            handle,
            period,
            running: None,
        }
    }

    /// Returns true while the timer task is alive
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts beating for a playthrough; restarts cleanly if already running
    pub fn start(&mut self, playthrough_id: PlaythroughId) {
        self.stop();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let pool = self.pool.clone();
        let handle = self.handle.clone();
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; skip it so a start/stop pair
            // shorter than one period writes nothing.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let progress = handle.progress();
                        if let Err(e) =
                            update_state_cache(&pool, &playthrough_id, progress.position, None).await
                        {
                            warn!("heartbeat write failed for {}: {}", playthrough_id, e);
                        }
                    }
                }
            }
            debug!("heartbeat stopped for {}", playthrough_id);
        });

        self.running = Some(RunningBeat {
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Stops the timer immediately; idempotent
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(true);
            running.task.abort();
        }
    }
}

impl Drop for PositionHeartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}
