//! HTTP backend for the sync engine
//!
//! The sync engine is transport-agnostic; this crate provides the real
//! thing. [`SyncClient`] implements `SyncBackend` against a remote source's
//! REST API with bearer-token auth.

pub mod client;

pub use client::{ClientConfig, SyncClient};
