//! Transport and session boundaries
//!
//! The engines in this crate never speak HTTP themselves; they drive a
//! [`SyncBackend`] and report credential failures through [`SessionHooks`].
//! Tests substitute scripted implementations of both.

use crate::error::SyncResult;
use crate::protocol::{
    EventPushRequest, EventPushResponse, LibraryChangesRequest, LibraryChangesResponse,
};
use async_trait::async_trait;
use talekeeper_core::SourceId;

/// Server transport used by the sync engines
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Fetches library changes since a point in time
    async fn fetch_library_changes(
        &self,
        request: &LibraryChangesRequest,
    ) -> SyncResult<LibraryChangesResponse>;

    /// Pushes locally recorded playback events
    async fn push_events(&self, request: &EventPushRequest) -> SyncResult<EventPushResponse>;
}

/// Session lifecycle callbacks
pub trait SessionHooks: Send + Sync {
    /// Called when a source rejects our credentials mid-sync
    fn force_sign_out(&self, source: &SourceId);
}

/// Hooks that do nothing; for tests and headless tools
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionHooks;

impl SessionHooks for NoopSessionHooks {
    fn force_sign_out(&self, _source: &SourceId) {}
}
