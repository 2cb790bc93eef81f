//! Owns the map of currently-running drains and reacts to configuration
//! changes streamed in from the config watcher.
//!
//! Every change is processed to completion — old supervisor stopped (subject
//! to its own 5s deadline), new one started — before the next change is
//! read off the channel. This keeps `start_drain`/`stop_drain` from ever
//! being called reentrantly from within each other, which is what let a
//! late-arriving restart race a `DELETE` in the tool this was modeled on.

use crate::broker::Broker;
use crate::supervisor::{self, SupervisorHandle};
use logyard_core::control::ConfigChange;
use logyard_core::error::Result;
use logyard_core::registry::DrainRegistry;
use logyard_core::retry::{RetryLimits, RetryPolicy};
use logyard_core::state::DrainStateUpdate;
use logyard_core::types::{DrainConfig, TopicFilter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const MANAGER_STOP_DEADLINE: Duration = Duration::from_secs(5);

pub struct DrainManager {
    broker: Broker,
    registry: Arc<DrainRegistry>,
    retry_limits: RetryLimits,
    default_retry_policy: RetryPolicy,
    state_tx: mpsc::Sender<DrainStateUpdate>,
    running: HashMap<String, SupervisorHandle>,
    states: Arc<Mutex<HashMap<String, DrainStateUpdate>>>,
}

impl DrainManager {
    #[must_use]
    pub fn new(
        broker: Broker,
        registry: Arc<DrainRegistry>,
        default_retry_policy: RetryPolicy,
        retry_limits: RetryLimits,
    ) -> Self {
        let (state_tx, mut state_rx) = mpsc::channel::<DrainStateUpdate>(128);
        let states = Arc::new(Mutex::new(HashMap::new()));
        let states_task = states.clone();
        let broker_task = broker.clone();

        tokio::spawn(async move {
            while let Some(update) = state_rx.recv().await {
                let topic = format!("event.drain_state.{}", update.name);
                if let Ok(payload) = serde_json::to_string(&update) {
                    broker_task.publish(logyard_core::types::Message::new(topic, payload));
                }
                states_task.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(update.name.clone(), update);
            }
        });

        Self { broker, registry, retry_limits, default_retry_policy, state_tx, running: HashMap::new(), states }
    }

    /// Snapshot of the last known state per drain, for the CLI's `list`
    /// command and the agent's HTTP status endpoint.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, DrainStateUpdate> {
        self.states.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// A cheap handle onto the same state map `snapshot()` reads, for a
    /// caller (the HTTP control API) that outlives `self` once `run()` takes
    /// it by value.
    #[must_use]
    pub fn states_handle(&self) -> Arc<Mutex<HashMap<String, DrainStateUpdate>>> {
        self.states.clone()
    }

    fn retry_policy_for(&self, name: &str) -> RetryPolicy {
        let mut policy = self.default_retry_policy.clone();
        policy.budget = self.retry_limits.budget_for(name, policy.budget);
        policy
    }

    /// Start a new drain, or restart it in place if one by this name already
    /// exists (covers a `SET` that changes an existing drain's config).
    pub async fn start_drain(&mut self, config: DrainConfig) -> Result<()> {
        if self.running.contains_key(&config.name) {
            self.stop_drain(&config.name).await;
        }

        let drain = self.registry.construct(config.kind)?;
        let subscription = self.broker.subscribe(TopicFilter::new(String::new()));
        let policy = self.retry_policy_for(&config.name);
        let name = config.name.clone();

        let handle = supervisor::spawn(name.clone(), config, drain, subscription, policy, self.state_tx.clone());
        handle.request_start().await;
        self.running.insert(name, handle);
        Ok(())
    }

    /// Stop a drain, enforcing the hard 5s deadline as a backstop even if
    /// the supervisor task itself is wedged.
    pub async fn stop_drain(&mut self, name: &str) {
        let Some(handle) = self.running.remove(name) else { return };
        handle.request_stop().await;
        if tokio::time::timeout(MANAGER_STOP_DEADLINE, handle.join).await.is_err() {
            tracing::warn!(drain = name, "supervisor task outlived the stop deadline");
        }
        self.states.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(name);
    }

    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains_key(name)
    }

    /// Consume the config watcher's change stream until it closes, applying
    /// each `Set`/`Delete` in turn.
    pub async fn run(&mut self, mut changes: mpsc::Receiver<ConfigChange>) {
        while let Some(change) = changes.recv().await {
            match change {
                ConfigChange::Set { config, .. } => {
                    let name = config.name.clone();
                    if let Err(err) = self.start_drain(config).await {
                        tracing::error!(drain = %name, error = %err, "failed to start drain");
                    }
                },
                ConfigChange::Delete { name, .. } => {
                    self.stop_drain(&name).await;
                },
            }
        }
        tracing::info!("config change stream closed, draining remaining supervisors");
        let names: Vec<String> = self.running.keys().cloned().collect();
        for name in names {
            self.stop_drain(&name).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use logyard_core::drain::Drain as DrainTrait;
    use logyard_core::types::{DrainKind, Message};
    use std::collections::HashMap as Map;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc::Receiver;

    struct RecordingDrain {
        started: Arc<AtomicBool>,
        stopped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl DrainTrait for RecordingDrain {
        fn start(&mut self, _config: DrainConfig, mut inbox: Receiver<Message>) {
            self.started.store(true, Ordering::SeqCst);
            tokio::spawn(async move { while inbox.recv().await.is_some() {} });
        }
        async fn stop(&mut self) -> Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn wait(&mut self) -> Result<()> {
            while !self.stopped.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
            Ok(())
        }
    }

    fn config(name: &str) -> DrainConfig {
        DrainConfig {
            name: name.to_string(),
            kind: DrainKind::Tcp,
            host: "127.0.0.1".into(),
            port: Some(1),
            filters: vec![],
            params: Map::new(),
        }
    }

    #[tokio::test]
    async fn start_then_stop_removes_from_running_set() {
        let mut registry = DrainRegistry::new();
        registry.register(
            DrainKind::Tcp,
            Arc::new(|| {
                Box::new(RecordingDrain { started: Arc::new(AtomicBool::new(false)), stopped: Arc::new(AtomicBool::new(false)) })
            }),
        );
        let mut manager =
            DrainManager::new(Broker::new(), Arc::new(registry), RetryPolicy::default(), RetryLimits::new());

        manager.start_drain(config("d1")).await.unwrap();
        assert!(manager.is_running("d1"));

        manager.stop_drain("d1").await;
        assert!(!manager.is_running("d1"));
    }

    #[tokio::test]
    async fn unknown_kind_is_an_error() {
        let registry = DrainRegistry::new();
        let mut manager =
            DrainManager::new(Broker::new(), Arc::new(registry), RetryPolicy::default(), RetryLimits::new());
        assert!(manager.start_drain(config("d1")).await.is_err());
    }
}
