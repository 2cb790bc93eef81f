//! The `file` drain: appends rendered messages as lines to a local path.
//!
//! Before each write it compares the path's current inode to the one it
//! opened, and reopens if they differ — this is what lets a `logrotate`-style
//! rename-then-recreate of the target file keep working without restarting
//! the drain.

use crate::spawned::SpawnedLoop;
use async_trait::async_trait;
use logyard_core::drain::Drain;
use logyard_core::error::{LogyardError, Result};
use logyard_core::render::{render, RenderFields};
use logyard_core::types::{DrainConfig, Message};
use std::os::unix::fs::MetadataExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::Receiver;
use tokio::sync::oneshot;

pub struct FileDrain {
    node_id: String,
    inner: Option<SpawnedLoop>,
}

impl FileDrain {
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self { node_id: node_id.into(), inner: None }
    }
}

#[async_trait]
impl Drain for FileDrain {
    fn start(&mut self, config: DrainConfig, inbox: Receiver<Message>) {
        let node_id = self.node_id.clone();
        self.inner = Some(SpawnedLoop::spawn(move |stop_rx| send_loop(node_id, config, inbox, stop_rx)));
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

async fn open_append(path: &str) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| LogyardError::Io(format!("open {path}: {e}")))
}

fn current_ino(path: &str) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.ino())
}

async fn send_loop(
    node_id: String,
    config: DrainConfig,
    mut inbox: Receiver<Message>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<()> {
    let path = config.host.clone();
    let mut file = open_append(&path).await?;
    let mut ino = current_ino(&path);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => return Ok(()),
            message = inbox.recv() => {
                let Some(message) = message else { return Ok(()) };

                let latest_ino = current_ino(&path);
                if latest_ino != ino {
                    file = open_append(&path).await?;
                    ino = current_ino(&path);
                }

                let fields = RenderFields::from_message(&message, &node_id, unix_time_now());
                let line = render(&message, &config, &fields)?;
                file.write_all(line.as_bytes()).await.map_err(|e| LogyardError::Io(e.to_string()))?;
                file.write_all(b"\n").await.map_err(|e| LogyardError::Io(e.to_string()))?;
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

    fn file_config(path: &str) -> DrainConfig {
        DrainConfig {
            name: "applog".into(),
            kind: logyard_core::types::DrainKind::File,
            host: path.to_string(),
            port: None,
            filters: vec![],
            params: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn appends_lines_to_the_target_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let path_str = path.to_str().unwrap().to_string();

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let mut drain = FileDrain::new("node-1");
        drain.start(file_config(&path_str), rx);

        tx.send(Message::new("apptail.myapp.web.1", "line one")).await.unwrap();
        tx.send(Message::new("apptail.myapp.web.1", "line two")).await.unwrap();
        drop(tx);

        drain.wait().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "line one\nline two\n");
    }

    #[tokio::test]
    async fn reopens_after_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let path_str = path.to_str().unwrap().to_string();

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let mut drain = FileDrain::new("node-1");
        drain.start(file_config(&path_str), rx);

        tx.send(Message::new("k", "before rotation")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let rotated_path = dir.path().join("app.log.1");
        tokio::fs::rename(&path, &rotated_path).await.unwrap();

        tx.send(Message::new("k", "after rotation")).await.unwrap();
        drop(tx);
        drain.wait().await.unwrap();

        let rotated = tokio::fs::read_to_string(&rotated_path).await.unwrap();
        let fresh = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(rotated, "before rotation\n");
        assert_eq!(fresh, "after rotation\n");
    }
}
