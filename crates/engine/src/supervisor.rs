//! Per-drain supervision: owns one `Drain` instance, forwards matching
//! broker messages into it, and applies the progressive retry policy when
//! its send loop exits with a retryable error.
//!
//! Every transition bumps a revision counter. Nothing outside this task
//! reads the revision to gate behavior — it travels outward on
//! `DrainStateUpdate` purely so external observers (the manager's drain map,
//! the CLI's `list` command) can tell a stale snapshot from a current one.

use logyard_core::drain::Drain;
use logyard_core::retry::{RetryPolicy, Retryer};
use logyard_core::state::{state_helpers, DrainState, DrainStateUpdate};
use logyard_core::types::DrainConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broker::Receiver as BrokerReceiver;

const STOP_DEADLINE: Duration = Duration::from_secs(5);
const DRAIN_INBOX_CAPACITY: usize = 64;

pub struct SupervisorHandle {
    pub name: String,
    pub action_tx: mpsc::Sender<Action>,
    pub rev: Arc<AtomicU64>,
    pub join: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy)]
pub enum Action {
    Start,
    Stop,
}

impl SupervisorHandle {
    pub async fn request_start(&self) {
        let _ = self.action_tx.send(Action::Start).await;
    }

    /// Request a stop and wait for the supervisor's own 5s hard deadline to
    /// elapse, so callers never block longer than the manager's contract
    /// promises.
    pub async fn request_stop(&self) {
        let _ = self.action_tx.send(Action::Stop).await;
    }

    #[must_use]
    pub fn current_rev(&self) -> u64 {
        self.rev.load(Ordering::SeqCst)
    }
}

pub fn spawn(
    name: String,
    config: DrainConfig,
    mut drain: Box<dyn Drain>,
    subscription: BrokerReceiver,
    retry_policy: RetryPolicy,
    state_tx: mpsc::Sender<DrainStateUpdate>,
) -> SupervisorHandle {
    let (action_tx, mut action_rx) = mpsc::channel(8);
    let rev = Arc::new(AtomicU64::new(0));
    let rev_task = rev.clone();
    let task_name = name.clone();
    let subscription = Arc::new(subscription);

    let join = tokio::spawn(async move {
        let name = task_name;
        let mut set_state = |state: DrainState| {
            let new_rev = rev_task.fetch_add(1, Ordering::SeqCst) + 1;
            state_helpers::emit(&state_tx, &name, state, new_rev);
        };
        set_state(DrainState::Stopped);

        'outer: loop {
            match action_rx.recv().await {
                None => break 'outer,
                Some(Action::Stop) => continue 'outer,
                Some(Action::Start) => {},
            }

            let mut retryer = Retryer::new(retry_policy.clone());

            'active: loop {
                set_state(DrainState::Starting);

                let (inbox_tx, inbox_rx) = mpsc::channel(DRAIN_INBOX_CAPACITY);
                drain.start(config.clone(), inbox_rx);

                let forward = spawn_forwarder(&subscription, config.clone(), inbox_tx);

                set_state(DrainState::Running);
                let started_at = Instant::now();

                tokio::select! {
                    action = action_rx.recv() => {
                        forward.abort();
                        let stopped_cleanly = tokio::time::timeout(STOP_DEADLINE, async {
                            let _ = drain.stop().await;
                            let _ = drain.wait().await;
                        }).await.is_ok();
                        if !stopped_cleanly {
                            tracing::warn!(drain = %name, "drain did not stop within 5s deadline, abandoning it");
                        }
                        set_state(DrainState::Stopped);
                        match action {
                            None => break 'outer,
                            Some(Action::Stop) => continue 'outer,
                            Some(Action::Start) => continue 'active,
                        }
                    }
                    result = drain.wait() => {
                        forward.abort();
                        match result {
                            Ok(()) => {
                                set_state(DrainState::Stopped);
                                continue 'outer;
                            }
                            Err(err) => {
                                retryer.note_healthy(started_at.elapsed());
                                if !err.is_retryable() {
                                    set_state(DrainState::Fatal { cause: err.to_string() });
                                    break 'active;
                                }
                                match retryer.next_backoff() {
                                    Some(backoff) => {
                                        set_state(DrainState::Retrying { cause: err.to_string() });
                                        if !wait_or_stop(&mut action_rx, backoff, &mut set_state).await {
                                            break 'outer;
                                        }
                                    }
                                    None => {
                                        set_state(DrainState::Fatal {
                                            cause: format!("retry budget exhausted, last error: {err}"),
                                        });
                                        break 'active;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    });

    SupervisorHandle { name, action_tx, rev, join }
}

/// Sleep out the backoff unless a `Stop`/closed action channel interrupts it
/// first. Returns `false` if the supervisor should exit entirely.
async fn wait_or_stop(
    action_rx: &mut mpsc::Receiver<Action>,
    backoff: Duration,
    set_state: &mut impl FnMut(DrainState),
) -> bool {
    tokio::select! {
        () = tokio::time::sleep(backoff) => true,
        action = action_rx.recv() => match action {
            None => {
                set_state(DrainState::Stopped);
                false
            }
            Some(Action::Stop) => {
                set_state(DrainState::Stopped);
                true
            }
            Some(Action::Start) => true,
        },
    }
}

fn spawn_forwarder(
    subscription: &Arc<BrokerReceiver>,
    config: DrainConfig,
    inbox_tx: mpsc::Sender<logyard_core::types::Message>,
) -> JoinHandle<()> {
    let subscription = subscription.clone();
    tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            if config.matches(&message.key) && inbox_tx.send(message).await.is_err() {
                break;
            }
        }
    })
}
