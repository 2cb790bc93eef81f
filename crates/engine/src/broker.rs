//! An in-process, topic-filtered publish/subscribe bus.
//!
//! Each subscription owns a bounded queue. When a publish would overflow it,
//! the oldest queued message is dropped to make room for the new one — a
//! slow subscriber loses history rather than stalling every publisher
//! (mirroring the drop-tolerant `BestEffort` connection mode drains use
//! internally, just applied to fan-out instead of a single link).

use logyard_core::types::{Message, TopicFilter};
use opentelemetry::metrics::Counter;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct Queue {
    messages: Mutex<VecDeque<Message>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    dropped_counter: Counter<u64>,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        let meter = opentelemetry::global::meter("logyard_engine");
        let dropped_counter = meter
            .u64_counter("logyard_broker_messages_dropped")
            .with_description("messages dropped from a subscription queue under back-pressure")
            .build();
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped_counter,
        }
    }

    fn push(&self, message: Message) {
        let mut dropped = false;
        {
            let mut queue = self.messages.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if queue.len() >= self.capacity {
                queue.pop_front();
                dropped = true;
            }
            queue.push_back(message);
        }
        if dropped {
            tracing::debug!("subscription queue full, dropped oldest message");
            self.dropped_counter.add(1, &[]);
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

struct Subscription {
    filter: TopicFilter,
    queue: Arc<Queue>,
}

/// A handle returned by `Broker::subscribe`. Dropping it unsubscribes.
pub struct Receiver {
    id: u64,
    broker: Arc<Inner>,
    queue: Arc<Queue>,
}

impl Receiver {
    /// Wait for the next message matching this subscription's filter.
    /// Returns `None` once `close()` has been called on the broker.
    pub async fn recv(&self) -> Option<Message> {
        loop {
            {
                let mut queue = self.queue.messages.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if let Some(message) = queue.pop_front() {
                    return Some(message);
                }
                if self.queue.closed.load(Ordering::SeqCst) {
                    return None;
                }
            }
            self.queue.notify.notified().await;
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.broker.remove(self.id);
    }
}

struct Inner {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<(u64, Subscription)>>,
    closed: AtomicBool,
}

impl Inner {
    fn remove(&self, id: u64) {
        let mut subs = self.subscriptions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        subs.retain(|(sub_id, _)| *sub_id != id);
    }
}

/// The process-local message bus. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<Inner>,
    queue_capacity: usize,
}

impl Broker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    #[must_use]
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                subscriptions: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
            queue_capacity,
        }
    }

    /// Deliver `message` to every subscription whose filter matches its key.
    pub fn publish(&self, message: Message) {
        let subs = self.inner.subscriptions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, sub) in subs.iter() {
            if sub.filter.matches(&message.key) {
                sub.queue.push(message.clone());
            }
        }
    }

    /// Register interest in every key starting with `filter`'s prefix.
    pub fn subscribe(&self, filter: TopicFilter) -> Receiver {
        let queue = Arc::new(Queue::new(self.queue_capacity));
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut subs = self.inner.subscriptions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            subs.push((id, Subscription { filter, queue: queue.clone() }));
        }
        Receiver { id, broker: self.inner.clone(), queue }
    }

    /// Wake every subscriber with an end-of-stream signal and drop them.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let mut subs = self.inner.subscriptions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, sub) in subs.drain(..) {
            sub.queue.close();
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_only_to_matching_subscribers() {
        let broker = Broker::new();
        let sys = broker.subscribe(TopicFilter::new("systail."));
        let app = broker.subscribe(TopicFilter::new("apptail."));

        broker.publish(Message::new("systail.web1.auth", "hi"));

        assert_eq!(sys.recv().await.unwrap().value, "hi");
        drop(sys);
        drop(app);
    }

    #[tokio::test]
    async fn full_queue_drops_oldest() {
        let broker = Broker::with_queue_capacity(2);
        let sub = broker.subscribe(TopicFilter::new(""));

        broker.publish(Message::new("k", "one"));
        broker.publish(Message::new("k", "two"));
        broker.publish(Message::new("k", "three"));

        assert_eq!(sub.recv().await.unwrap().value, "two");
        assert_eq!(sub.recv().await.unwrap().value, "three");
    }

    #[tokio::test]
    async fn close_wakes_pending_receivers_with_none() {
        let broker = Broker::new();
        let sub = broker.subscribe(TopicFilter::new(""));
        let recv_task = tokio::spawn(async move { sub.recv().await });

        tokio::task::yield_now().await;
        broker.close();

        assert_eq!(recv_task.await.unwrap(), None);
    }

    #[tokio::test]
    async fn dropping_receiver_unsubscribes() {
        let broker = Broker::new();
        let sub = broker.subscribe(TopicFilter::new(""));
        assert_eq!(broker.subscriber_count(), 1);
        drop(sub);
        assert_eq!(broker.subscriber_count(), 0);
    }
}
