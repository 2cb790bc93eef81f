//! The `Drain` trait every backend (tcp, udp, redis, file) implements.
//!
//! `start` spawns the drain's internal send loop and returns immediately;
//! `wait` blocks until that loop exits and surfaces the error that ended it,
//! if any. This mirrors a start/stop/wait lifecycle rather than a single
//! `run` future so the supervisor can `select!` over `wait()` alongside its
//! own action channel without needing to poll.

use crate::error::Result;
use crate::types::{DrainConfig, Message};
use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;

#[async_trait]
pub trait Drain: Send {
    /// Begin consuming from `inbox` and delivering to the backend. Must not
    /// block; any connection work happens in a spawned task.
    fn start(&mut self, config: DrainConfig, inbox: Receiver<Message>);

    /// Request the send loop to stop and wait up to the caller's own
    /// deadline for it to do so. Idempotent.
    async fn stop(&mut self) -> Result<()>;

    /// Block until the send loop started by `start` exits. Returns the error
    /// that caused it to exit, or `Ok(())` on a clean stop.
    async fn wait(&mut self) -> Result<()>;
}

/// A constructor closure rather than a bare `fn` pointer, so a factory can
/// close over daemon-wide context a drain needs at construction time (e.g.
/// the redis drain's cluster endpoint override).
pub type DrainFactory = std::sync::Arc<dyn Fn() -> Box<dyn Drain> + Send + Sync>;
