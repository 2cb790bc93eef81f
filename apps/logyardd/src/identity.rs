// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Node identity resolution.
//!
//! Every agent needs two identifiers: a `node_id` naming it on shared
//! control topics (derived from its outbound network address, since nodes
//! otherwise have no configured name), and an `aggregator_id` — a UUID
//! persisted to disk — identifying this particular daemon instance across
//! restarts for point-to-point delivery.

use std::net::UdpSocket;
use std::path::Path;

use crate::config::NodeConfig;

#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub node_id: String,
    pub aggregator_id: String,
}

/// Resolve this node's identity from config overrides, falling back to
/// network discovery and a persisted UUID.
///
/// # Errors
///
/// Returns an error if `node.id` isn't set and no outbound interface can be
/// discovered, or if the aggregator id can't be read or persisted.
pub fn resolve(config: &NodeConfig) -> anyhow::Result<NodeIdentity> {
    let node_id = match &config.id {
        Some(id) => id.clone(),
        None => discover_outbound_ipv4()?,
    };
    let aggregator_id = load_or_generate_aggregator_id(Path::new(&config.id_path))?;
    Ok(NodeIdentity { node_id, aggregator_id })
}

/// Finds this host's non-loopback IPv4 address by asking the OS which local
/// interface it would use to reach a public address, without sending any
/// traffic (UDP `connect` only resolves a route).
fn discover_outbound_ipv4() -> anyhow::Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip().to_string())
}

fn load_or_generate_aggregator_id(path: &Path) -> anyhow::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let id = contents.trim().to_string();
            if id.is_empty() {
                generate_and_persist_aggregator_id(path)
            } else {
                Ok(id)
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => generate_and_persist_aggregator_id(path),
        Err(e) => Err(e.into()),
    }
}

fn generate_and_persist_aggregator_id(path: &Path) -> anyhow::Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &id)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregator_id_persists_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node-id");

        let first = load_or_generate_aggregator_id(&path).unwrap();
        let second = load_or_generate_aggregator_id(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn aggregator_id_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/node-id");

        let id = load_or_generate_aggregator_id(&path).unwrap();
        assert!(!id.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn explicit_node_id_overrides_discovery() {
        let config = NodeConfig { id: Some("10.0.0.5".to_string()), ..NodeConfig::default() };
        let identity = resolve(&config).unwrap();
        assert_eq!(identity.node_id, "10.0.0.5");
    }
}
