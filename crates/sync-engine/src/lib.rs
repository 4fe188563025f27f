//! Server synchronization engine
//!
//! Keeps the local cache converged with one or more remote sources:
//!
//! - [`down::LibrarySyncEngine`] pulls library changes and applies deltas,
//!   deletions and the sync cursor in one transaction, last-write-wins.
//! - [`up::EventSyncEngine`] pushes unsynced playback events and stamps the
//!   acknowledged ones.
//! - [`coordinator::SyncCoordinator`] serializes rounds per source and
//!   publishes a data version the UI can watch.
//!
//! The actual transport lives behind the [`backend::SyncBackend`] trait.

pub mod backend;
pub mod coordinator;
pub mod deletions;
pub mod down;
pub mod error;
pub mod protocol;
pub mod up;

pub use backend::{NoopSessionHooks, SessionHooks, SyncBackend};
pub use coordinator::{SyncConfig, SyncCoordinator, SyncReport};
pub use down::{LibrarySyncEngine, SyncOutcome, DEFAULT_DEBOUNCE};
pub use error::{SyncError, SyncResult};
pub use protocol::{
    EventPushRequest, EventPushResponse, LibraryChangesRequest, LibraryChangesResponse,
};
pub use up::{EventSyncEngine, UpSyncOutcome};
