//! Shared start/stop/wait bookkeeping for drains that run their send loop
//! as a single spawned task. Each backend only has to provide the loop body.

use logyard_core::error::{LogyardError, Result};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct SpawnedLoop {
    handle: Option<JoinHandle<Result<()>>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl SpawnedLoop {
    /// `body` receives the stop signal receiver it should select on.
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(body(stop_rx));
        Self { handle: Some(handle), stop_tx: Some(stop_tx) }
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        Ok(())
    }

    pub async fn wait(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(LogyardError::Fatal(format!("drain task panicked: {e}"))),
        }
    }
}
