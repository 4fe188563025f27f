//! Library down-sync
//!
//! One round: check the debounce window, ask the source for changes since
//! `new_data_as_of`, then apply deltas, tombstones and the cursor advance in
//! a single transaction. A failed round leaves the local cache exactly as it
//! was; there is no partial application.

use crate::backend::{SessionHooks, SyncBackend};
use crate::deletions::apply_deletions;
use crate::error::{SyncError, SyncResult};
use crate::protocol::LibraryChangesRequest;
use log::{debug, info, warn};
use std::sync::Arc;
use talekeeper_core::{AppError, SourceId, SyncedServer, Timestamp};
use talekeeper_database::queries::{library, servers};
use talekeeper_database::DbPool;

/// Minimum spacing between down-sync rounds for one source
pub const DEFAULT_DEBOUNCE: std::time::Duration = std::time::Duration::from_secs(60);

/// What a down-sync round did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Skipped because the previous round finished too recently
    Debounced,
    /// Completed a round against the server
    Applied { deltas: usize, deletions: usize },
}

impl SyncOutcome {
    /// True when the round wrote any library data locally
    pub fn mutated(&self) -> bool {
        matches!(self, SyncOutcome::Applied { deltas, deletions } if deltas + deletions > 0)
    }
}

/// Pulls library changes from a remote source into the local cache
pub struct LibrarySyncEngine {
    pool: DbPool,
    backend: Arc<dyn SyncBackend>,
    hooks: Arc<dyn SessionHooks>,
    debounce: std::time::Duration,
}

impl LibrarySyncEngine {
    /// Creates an engine with the default debounce window
    pub fn new(pool: DbPool, backend: Arc<dyn SyncBackend>, hooks: Arc<dyn SessionHooks>) -> Self {
        Self {
            pool,
            backend,
            hooks,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Overrides the debounce window
    pub fn with_debounce(mut self, debounce: std::time::Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Runs one down-sync round for a source
    pub async fn sync_down(&self, source_id: &SourceId) -> SyncResult<SyncOutcome> {
        let cursor = servers::get_synced_server(&self.pool, source_id)
            .await?
            .unwrap_or_else(|| SyncedServer::new(source_id.clone()));

        if let Some(last) = cursor.last_down_sync {
            let elapsed = Timestamp::now().as_millis() - last.as_millis();
            // Negative elapsed means the server clock is ahead of ours;
            // treat that as "just synced" rather than syncing in a loop.
            if elapsed < self.debounce.as_millis() as i64 {
                debug!(
                    "down-sync for {} debounced, {} ms since last round",
                    source_id, elapsed
                );
                return Ok(SyncOutcome::Debounced);
            }
        }

        let request = LibraryChangesRequest {
            source_id: source_id.clone(),
            since: cursor.new_data_as_of.map(|t| t.to_datetime()),
        };

        let response = match self.backend.fetch_library_changes(&request).await {
            Err(SyncError::Unauthorized(message)) => {
                warn!("source {} rejected our session", source_id);
                self.hooks.force_sign_out(source_id);
                return Err(SyncError::Unauthorized(message));
            }
            other => other?,
        };

        let deltas = response.delta_count();
        let deletions = response.deletions.len();
        let server_time = Timestamp::from(response.server_time);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to begin down-sync transaction", e))?;

        // Parents before children, matching the schema's foreign keys
        for person in &response.people {
            library::upsert_person(&mut *tx, person).await?;
        }
        for author in &response.authors {
            library::upsert_author(&mut *tx, author).await?;
        }
        for narrator in &response.narrators {
            library::upsert_narrator(&mut *tx, narrator).await?;
        }
        for book in &response.books {
            library::upsert_book(&mut *tx, book).await?;
        }
        for series in &response.series {
            library::upsert_series(&mut *tx, series).await?;
        }
        for series_book in &response.series_books {
            library::upsert_series_book(&mut *tx, series_book).await?;
        }
        for book_author in &response.book_authors {
            library::upsert_book_author(&mut *tx, book_author).await?;
        }
        for media in &response.media {
            library::upsert_media(&mut *tx, media).await?;
        }
        for media_narrator in &response.media_narrators {
            library::upsert_media_narrator(&mut *tx, media_narrator).await?;
        }

        apply_deletions(&mut tx, source_id, &response.deletions).await?;

        let updated = SyncedServer {
            source_id: source_id.clone(),
            last_down_sync: Some(server_time),
            // The data frontier moves only when this round carried entity
            // deltas; freshness-polling rounds must not hide unseen data.
            new_data_as_of: if deltas > 0 {
                Some(server_time)
            } else {
                cursor.new_data_as_of
            },
        };
        servers::upsert_synced_server(&mut *tx, &updated).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit down-sync transaction", e))?;

        info!(
            "down-sync for {}: {} deltas, {} deletions",
            source_id, deltas, deletions
        );
        Ok(SyncOutcome::Applied { deltas, deletions })
    }
}
