//! The `tcp` and `udp` drains: dial once, then write every rendered
//! message to the connection. A write error or a dial failure both surface
//! through `wait()` so the supervisor can decide whether to retry.

use crate::spawned::SpawnedLoop;
use async_trait::async_trait;
use logyard_core::drain::Drain;
use logyard_core::error::{LogyardError, Result};
use logyard_core::render::{render, RenderFields};
use logyard_core::types::{DrainConfig, DrainKind, Message};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc::Receiver;
use tokio::sync::oneshot;

const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct IpConnDrain {
    kind: DrainKind,
    node_id: String,
    inner: Option<SpawnedLoop>,
}

impl IpConnDrain {
    #[must_use]
    pub fn tcp(node_id: impl Into<String>) -> Self {
        Self { kind: DrainKind::Tcp, node_id: node_id.into(), inner: None }
    }

    #[must_use]
    pub fn udp(node_id: impl Into<String>) -> Self {
        Self { kind: DrainKind::Udp, node_id: node_id.into(), inner: None }
    }
}

#[async_trait]
impl Drain for IpConnDrain {
    fn start(&mut self, config: DrainConfig, inbox: Receiver<Message>) {
        let kind = self.kind;
        let node_id = self.node_id.clone();
        self.inner = Some(SpawnedLoop::spawn(move |stop_rx| send_loop(kind, node_id, config, inbox, stop_rx)));
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

enum Conn {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Conn {
    async fn dial(kind: DrainKind, config: &DrainConfig) -> Result<Self> {
        let port = config
            .port
            .ok_or_else(|| LogyardError::Configuration(format!("drain {} missing port", config.name)))?;
        let addr = format!("{}:{port}", config.host);

        match kind {
            DrainKind::Tcp => {
                let stream = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(&addr))
                    .await
                    .map_err(|_| LogyardError::Connect(format!("dial tcp {addr}: timed out")))?
                    .map_err(|e| LogyardError::Connect(format!("dial tcp {addr}: {e}")))?;
                Ok(Self::Tcp(stream))
            },
            DrainKind::Udp => {
                let socket = UdpSocket::bind("0.0.0.0:0")
                    .await
                    .map_err(|e| LogyardError::Connect(format!("bind udp socket: {e}")))?;
                tokio::time::timeout(DIAL_TIMEOUT, socket.connect(&addr))
                    .await
                    .map_err(|_| LogyardError::Connect(format!("dial udp {addr}: timed out")))?
                    .map_err(|e| LogyardError::Connect(format!("dial udp {addr}: {e}")))?;
                Ok(Self::Udp(socket))
            },
            other => Err(LogyardError::Fatal(format!("{} is not an ip-connection drain", other.as_str()))),
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        match self {
            Self::Tcp(stream) => {
                stream.write_all(line.as_bytes()).await.map_err(|e| LogyardError::Connect(e.to_string()))?;
                stream.write_all(b"\n").await.map_err(|e| LogyardError::Connect(e.to_string()))
            },
            Self::Udp(socket) => {
                socket.send(line.as_bytes()).await.map_err(|e| LogyardError::Connect(e.to_string()))?;
                Ok(())
            },
        }
    }
}

async fn send_loop(
    kind: DrainKind,
    node_id: String,
    config: DrainConfig,
    mut inbox: Receiver<Message>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<()> {
    let mut conn = Conn::dial(kind, &config).await?;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => return Ok(()),
            message = inbox.recv() => {
                let Some(message) = message else { return Ok(()) };
                let fields = RenderFields::from_message(&message, &node_id, unix_time_now());
                let line = render(&message, &config, &fields)?;
                conn.send_line(&line).await?;
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
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn tcp_config(name: &str, port: u16) -> DrainConfig {
        DrainConfig {
            name: name.to_string(),
            kind: DrainKind::Tcp,
            host: "127.0.0.1".to_string(),
            port: Some(port),
            filters: vec![],
            params: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn delivers_raw_messages_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let mut drain = IpConnDrain::tcp("node-1");
        drain.start(tcp_config("d1", port), rx);

        tx.send(Message::new("systail.web1.auth", "login ok")).await.unwrap();
        drop(tx);

        drain.wait().await.unwrap();
        let received = accept.await.unwrap();
        assert_eq!(received, b"login ok\n".to_vec());
    }

    #[tokio::test]
    async fn dial_failure_is_a_connect_error() {
        let (_tx, rx) = tokio::sync::mpsc::channel(8);
        let mut drain = IpConnDrain::tcp("node-1");
        // Port 0 after connect attempt resolves to "invalid argument" / connection refused.
        drain.start(tcp_config("d1", 1), rx);
        let err = drain.wait().await.unwrap_err();
        assert!(matches!(err, LogyardError::Connect(_)));
    }
}
