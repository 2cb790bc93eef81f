//! Control messages exchanged between the config watcher and the manager.
//! (The manager-to-supervisor direction has its own `Action` type local to
//! the engine crate's `supervisor` module.)

use crate::types::DrainConfig;
use serde::{Deserialize, Serialize};

/// A single mutation observed on the `drains/` subtree of the coordinated
/// configuration store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfigChange {
    Set { name: String, config: DrainConfig, rev: u64 },
    Delete { name: String, rev: u64 },
}

impl ConfigChange {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Set { name, .. } | Self::Delete { name, .. } => name,
        }
    }

    #[must_use]
    pub const fn rev(&self) -> u64 {
        match self {
            Self::Set { rev, .. } | Self::Delete { rev, .. } => *rev,
        }
    }
}
