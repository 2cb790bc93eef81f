//! Built-in drain backends: `tcp`, `udp`, `redis` and `file`.

pub mod file;
pub mod redis;
mod spawned;
pub mod tcp_udp;

use logyard_core::drain::{Drain, DrainFactory};
use logyard_core::registry::DrainRegistry;
use logyard_core::types::DrainKind;
use std::sync::Arc;

/// Populate a registry with the four built-in drains. `node_id` is embedded
/// in rendered messages (the `{NodeID}` template hole) and `cluster_endpoint`
/// is consulted by the redis drain for `stackato-core` host rewriting.
pub fn register_builtin_drains(
    registry: &mut DrainRegistry,
    node_id: &str,
    cluster_endpoint: Option<String>,
) {
    let tcp_node_id = node_id.to_string();
    registry.register(
        DrainKind::Tcp,
        Arc::new(move || Box::new(tcp_udp::IpConnDrain::tcp(tcp_node_id.clone())) as Box<dyn Drain>),
    );

    let udp_node_id = node_id.to_string();
    registry.register(
        DrainKind::Udp,
        Arc::new(move || Box::new(tcp_udp::IpConnDrain::udp(udp_node_id.clone())) as Box<dyn Drain>),
    );

    let redis_node_id = node_id.to_string();
    let redis_cluster_endpoint = cluster_endpoint;
    registry.register(
        DrainKind::Redis,
        Arc::new(move || {
            Box::new(redis::RedisDrain::new(redis_node_id.clone(), redis_cluster_endpoint.clone()))
                as Box<dyn Drain>
        }),
    );

    let file_node_id = node_id.to_string();
    registry
        .register(DrainKind::File, Arc::new(move || Box::new(file::FileDrain::new(file_node_id.clone())) as Box<dyn Drain>));

    tracing::info!("registered built-in drains: tcp, udp, redis, file");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_four_kinds_are_registered() {
        let mut registry = DrainRegistry::new();
        register_builtin_drains(&mut registry, "node-1", None);
        assert!(registry.contains(DrainKind::Tcp));
        assert!(registry.contains(DrainKind::Udp));
        assert!(registry.contains(DrainKind::Redis));
        assert!(registry.contains(DrainKind::File));
    }
}
