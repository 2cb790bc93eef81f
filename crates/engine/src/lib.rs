//! The message bus and drain supervision engine.
//!
//! ## Modules
//!
//! - [`broker`]: the in-process topic-filtered publish/subscribe bus.
//! - [`client`]: a convenience handle for publishing and receiving on a
//!   single topic filter (used by the agent's ingest side).
//! - [`supervisor`]: the per-drain state machine — start, retry, stop.
//! - [`manager`]: owns the running-drain map and reacts to config changes.

pub mod broker;
pub mod client;
pub mod manager;
pub mod supervisor;

pub use broker::{Broker, Receiver};
pub use client::Client;
pub use manager::DrainManager;
pub use supervisor::{Action, SupervisorHandle};
