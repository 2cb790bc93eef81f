//! The `redis` drain: pushes each rendered message onto a list (`LPUSH`),
//! optionally trimming it to a ring buffer of fixed length (`LTRIM`) so the
//! list never grows past `limit` entries — the circular-buffer logging
//! pattern the original tool called "Lpushcircular".
//!
//! `host=stackato-core` (and `stackato-core:<port>`) are resolved against a
//! cluster-wide endpoint supplied by the daemon rather than looked up
//! directly, since individual nodes don't know their cluster's shared redis
//! address by themselves.

use crate::spawned::SpawnedLoop;
use async_trait::async_trait;
use logyard_core::drain::Drain;
use logyard_core::error::{LogyardError, Result};
use logyard_core::render::{render, RenderFields};
use logyard_core::types::{DrainConfig, Message};
use redis::AsyncCommands;
use tokio::sync::mpsc::Receiver;
use tokio::sync::oneshot;

pub struct RedisDrain {
    node_id: String,
    cluster_endpoint: Option<String>,
    inner: Option<SpawnedLoop>,
}

impl RedisDrain {
    #[must_use]
    pub fn new(node_id: impl Into<String>, cluster_endpoint: Option<String>) -> Self {
        Self { node_id: node_id.into(), cluster_endpoint, inner: None }
    }
}

#[async_trait]
impl Drain for RedisDrain {
    fn start(&mut self, config: DrainConfig, inbox: Receiver<Message>) {
        let node_id = self.node_id.clone();
        let cluster_endpoint = self.cluster_endpoint.clone();
        self.inner =
            Some(SpawnedLoop::spawn(move |stop_rx| send_loop(node_id, cluster_endpoint, config, inbox, stop_rx)));
    }

    async fn stop(&mut self) -> Result<()> {
        match &mut self.inner {
            Some(inner) => inner.stop().await,
            None => Ok(()),
        }
    }

    async fn wait(&mut self) -> Result<()> {
        match &mut self.inner {
            Some(inner) => inner.wait().await,
            None => Ok(()),
        }
    }
}

/// Resolve `host`/`port`, rewriting the `stackato-core` pseudo-host to the
/// cluster's shared redis endpoint.
fn resolve_endpoint(config: &DrainConfig, cluster_endpoint: Option<&str>) -> Result<(String, u16)> {
    if config.host == "stackato-core" {
        let endpoint = cluster_endpoint
            .ok_or_else(|| LogyardError::Configuration("stackato-core host requires a cluster endpoint".into()))?;
        split_endpoint(endpoint)
    } else if let Some(port_override) = config.host.strip_prefix("stackato-core:") {
        let endpoint = cluster_endpoint
            .ok_or_else(|| LogyardError::Configuration("stackato-core host requires a cluster endpoint".into()))?;
        let (host, _) = split_endpoint(endpoint)?;
        let port: u16 = port_override
            .parse()
            .map_err(|_| LogyardError::Configuration(format!("invalid port override: {port_override}")))?;
        Ok((host, port))
    } else {
        Ok((config.host.clone(), config.port.unwrap_or(6379)))
    }
}

fn split_endpoint(endpoint: &str) -> Result<(String, u16)> {
    let (host, port) = endpoint
        .split_once(':')
        .ok_or_else(|| LogyardError::Configuration(format!("malformed cluster endpoint: {endpoint}")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| LogyardError::Configuration(format!("malformed cluster endpoint port: {endpoint}")))?;
    Ok((host.to_string(), port))
}

async fn lpush_circular(
    conn: &mut redis::aio::MultiplexedConnection,
    key: &str,
    value: &str,
    limit: u64,
) -> Result<()> {
    conn.lpush::<_, _, ()>(key, value).await.map_err(|e| LogyardError::Connect(e.to_string()))?;
    if limit > 0 {
        let upper = isize::try_from(limit.saturating_sub(1)).unwrap_or(isize::MAX);
        conn.ltrim::<_, ()>(key, 0, upper).await.map_err(|e| LogyardError::Connect(e.to_string()))?;
    }
    Ok(())
}

async fn send_loop(
    node_id: String,
    cluster_endpoint: Option<String>,
    config: DrainConfig,
    mut inbox: Receiver<Message>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<()> {
    let (host, port) = resolve_endpoint(&config, cluster_endpoint.as_deref())?;
    let db = config.redis_database();
    let url = format!("redis://{host}:{port}/{db}");

    let client = redis::Client::open(url).map_err(|e| LogyardError::Configuration(e.to_string()))?;
    let mut conn =
        client.get_multiplexed_async_connection().await.map_err(|e| LogyardError::Connect(e.to_string()))?;

    let fixed_key = config.redis_key().map(str::to_string);
    let limit = config.redis_limit();

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => return Ok(()),
            message = inbox.recv() => {
                let Some(message) = message else { return Ok(()) };
                let key = fixed_key.as_deref().unwrap_or(&message.key);
                let fields = RenderFields::from_message(&message, &node_id, unix_time_now());
                let line = render(&message, &config, &fields)?;
                lpush_circular(&mut conn, key, &line, limit).await?;
            }
        }
    }
}

fn unix_time_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(host: &str) -> DrainConfig {
        DrainConfig {
            name: "ring".into(),
            kind: logyard_core::types::DrainKind::Redis,
            host: host.to_string(),
            port: None,
            filters: vec![],
            params: HashMap::new(),
        }
    }

    #[test]
    fn plain_host_is_used_as_is() {
        let (host, port) = resolve_endpoint(&cfg("10.0.0.9"), None).unwrap();
        assert_eq!(host, "10.0.0.9");
        assert_eq!(port, 6379);
    }

    #[test]
    fn stackato_core_rewrites_to_cluster_endpoint() {
        let (host, port) = resolve_endpoint(&cfg("stackato-core"), Some("10.1.1.1:6380")).unwrap();
        assert_eq!(host, "10.1.1.1");
        assert_eq!(port, 6380);
    }

    #[test]
    fn stackato_core_with_port_override() {
        let (host, port) = resolve_endpoint(&cfg("stackato-core:6390"), Some("10.1.1.1:6380")).unwrap();
        assert_eq!(host, "10.1.1.1");
        assert_eq!(port, 6390);
    }

    #[test]
    fn stackato_core_without_cluster_endpoint_is_a_configuration_error() {
        let err = resolve_endpoint(&cfg("stackato-core"), None).unwrap_err();
        assert!(matches!(err, LogyardError::Configuration(_)));
    }
}
