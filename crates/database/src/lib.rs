//! TaleKeeper Database Layer
//!
//! This crate provides the local store for the TaleKeeper audiobook client:
//! the library cache, the append-only playback event log, playthrough
//! aggregates, the heartbeat state cache, and per-source sync cursors.
//! It uses SQLite with sqlx.

pub mod connection;
pub mod migrations;
pub mod queries;

pub use connection::{create_test_db, DbPool};
pub use migrations::{optimize, run_migrations, verify_integrity};
