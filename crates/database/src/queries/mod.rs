//! Database query modules
//!
//! Query functions take `impl SqliteExecutor` so they run against the pool
//! directly or inside a transaction; the sync batch apply and the
//! event-append-plus-rebuild path both rely on composing these in one
//! transaction.

pub mod events;
pub mod library;
pub mod playthroughs;
pub mod servers;
pub mod state_cache;
