//! A thin `Send`/`Recv`/`Close` facade over the broker, for callers that want
//! a single handle rather than the broker's split publish/subscribe API —
//! the CLI's `stream` command and any future in-process producer.

use crate::broker::{Broker, Receiver};
use logyard_core::types::{Message, TopicFilter};

pub struct Client {
    broker: Broker,
    receiver: Option<Receiver>,
}

impl Client {
    #[must_use]
    pub fn new(broker: Broker) -> Self {
        Self { broker, receiver: None }
    }

    pub fn send(&self, key: impl Into<String>, value: impl Into<String>) {
        self.broker.publish(Message::new(key, value));
    }

    /// Subscribe this client to `filter`. Replaces any prior subscription.
    pub fn listen(&mut self, filter: TopicFilter) {
        self.receiver = Some(self.broker.subscribe(filter));
    }

    /// Receive the next message for the active subscription, if any.
    pub async fn recv(&self) -> Option<Message> {
        match &self.receiver {
            Some(receiver) => receiver.recv().await,
            None => None,
        }
    }

    pub fn close(&mut self) {
        self.receiver = None;
    }
}
