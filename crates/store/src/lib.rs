//! Client-side abstraction over the coordinated configuration store.
//!
//! The real store is a Doozer-like coordination service external to this
//! crate; [`config_store`] provides a file-backed implementation with the
//! same key layout and change-stream shape, suitable for a single-node
//! deployment or for tests that don't want to stand up the real thing.

pub mod config_store;

pub use config_store::{ConfigSnapshot, FileConfigStore, WatchGuard};
