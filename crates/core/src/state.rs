//! Drain lifecycle states.
//!
//! ```text
//!        ┌─────────┐   start    ┌──────────┐   Wait() ok   ┌─────────┐
//!        │ Stopped │ ─────────> │ Starting │ ────────────> │ Running │
//!        └─────────┘            └──────────┘               └─────────┘
//!             ^                      │ Wait() err                │ Wait() err
//!             │ Stop()               v                           v
//!             │                 ┌──────────┐   budget exceeded ┌───────┐
//!             └──────────────── │ Retrying │ ─────────────────>│ Fatal │
//!                   Stop()      └──────────┘                   └───────┘
//! ```
//!
//! Every transition is paired with a revision number. A transition is only
//! applied if the caller's revision still matches the current one, which is
//! what lets a spawned retry or monitor task detect that it has been
//! superseded by a newer `Stop` or `Start` without needing a lock held across
//! the `.await`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DrainState {
    Stopped,
    Starting,
    Running,
    /// Last attempt failed with a retryable error; a backoff is in flight.
    Retrying { cause: String },
    /// The retry budget was exhausted or the error was non-retryable.
    Fatal { cause: String },
}

impl DrainState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Retrying { .. })
    }
}

/// A state change broadcast to interested observers (the manager, the CLI
/// `list` command, metrics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainStateUpdate {
    pub name: String,
    pub state: DrainState,
    pub rev: u64,
}

pub mod state_helpers {
    use super::{DrainState, DrainStateUpdate};
    use tokio::sync::mpsc::Sender;

    pub fn emit(tx: &Sender<DrainStateUpdate>, name: &str, state: DrainState, rev: u64) {
        let update = DrainStateUpdate { name: name.to_string(), state, rev };
        if tx.try_send(update).is_err() {
            tracing::trace!(drain = name, "state update dropped, no active receiver");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_is_terminal_others_are_not() {
        assert!(DrainState::Fatal { cause: "x".into() }.is_terminal());
        assert!(!DrainState::Stopped.is_terminal());
        assert!(!DrainState::Retrying { cause: "x".into() }.is_terminal());
    }

    #[test]
    fn running_and_retrying_are_active() {
        assert!(DrainState::Running.is_active());
        assert!(DrainState::Retrying { cause: "timeout".into() }.is_active());
        assert!(!DrainState::Stopped.is_active());
        assert!(!DrainState::Fatal { cause: "x".into() }.is_active());
    }
}
