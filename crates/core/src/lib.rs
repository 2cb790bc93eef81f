//! Core types, error handling, the drain trait and the supervision state
//! model shared by the engine, the drain implementations and the agent.
//!
//! ## Modules
//!
//! - [`types`]: `Message`, `TopicFilter`, `DrainConfig` and the closed set of
//!   drain kinds.
//! - [`uri`]: encoding/decoding a `DrainConfig` to and from its URI form.
//! - [`render`]: turning a `Message` into drain-specific wire bytes.
//! - [`drain`]: the `Drain` trait every backend implements.
//! - [`registry`]: the closed, compile-time drain constructor registry.
//! - [`state`]: the drain lifecycle state machine's states.
//! - [`control`]: messages exchanged between the manager and a supervisor.
//! - [`retry`]: progressive backoff and per-prefix retry budgets.
//! - [`error`]: the crate's error type.

pub mod control;
pub mod drain;
pub mod error;
pub mod registry;
pub mod render;
pub mod retry;
pub mod state;
pub mod types;
pub mod uri;

pub use drain::{Drain, DrainFactory};
pub use error::{LogyardError, Result};
pub use registry::DrainRegistry;
pub use state::{state_helpers, DrainState, DrainStateUpdate};
pub use types::{DrainConfig, DrainKind, Message, MessageFormat, TopicFilter};
