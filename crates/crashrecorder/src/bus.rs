//! Signal and event bus abstraction.
//!
//! The recorder never talks to a concrete vehicle data broker or message
//! broker. It subscribes through the [`SignalBus`] and [`EventBus`] traits,
//! and [`LocalBus`] implements both in-process for the stdio bridge and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::Result;

/// Buffer size of each subscription channel.
const SUBSCRIPTION_BUFFER: usize = 256;

/// Source of vehicle signal updates.
#[async_trait]
pub trait SignalBus: Send + Sync {
    /// Subscribe to updates of the signal at `path`.
    ///
    /// Every new value is delivered on the returned channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription can't be established.
    async fn subscribe(&self, path: &str) -> Result<mpsc::Receiver<Value>>;
}

/// Message transport for trigger events and acknowledgments.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Subscribe to raw message payloads published on `topic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription can't be established.
    async fn subscribe_topic(&self, topic: &str) -> Result<mpsc::Receiver<String>>;

    /// Publish `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message can't be handed to the transport.
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;
}

type Subscribers<T> = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<T>>>>>;

/// In-process bus fanning out each message to every subscriber of its key.
///
/// This is a lightweight, cloneable handle; clones share subscriptions.
#[derive(Debug, Clone, Default)]
pub struct LocalBus {
    signals: Subscribers<Value>,
    topics: Subscribers<String>,
}

impl LocalBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new value for the signal at `path`.
    ///
    /// Returns how many subscribers received it.
    pub async fn push_signal(&self, path: &str, value: Value) -> usize {
        trace!(path, %value, "Signal update");
        fan_out(&self.signals, path, value).await
    }

    /// Number of live subscriptions to the signal at `path`.
    #[must_use]
    pub fn signal_subscribers(&self, path: &str) -> usize {
        live_count(&self.signals, path)
    }

    /// Number of live subscriptions to `topic`.
    #[must_use]
    pub fn topic_subscribers(&self, topic: &str) -> usize {
        live_count(&self.topics, topic)
    }
}

#[async_trait]
impl SignalBus for LocalBus {
    async fn subscribe(&self, path: &str) -> Result<mpsc::Receiver<Value>> {
        debug!(path, "Subscribing to signal");
        Ok(register(&self.signals, path))
    }
}

#[async_trait]
impl EventBus for LocalBus {
    async fn subscribe_topic(&self, topic: &str) -> Result<mpsc::Receiver<String>> {
        debug!(topic, "Subscribing to topic");
        Ok(register(&self.topics, topic))
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        trace!(topic, %payload, "Publishing");
        fan_out(&self.topics, topic, payload).await;
        Ok(())
    }
}

fn register<T>(subscribers: &Subscribers<T>, key: &str) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
    subscribers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key.to_string())
        .or_default()
        .push(tx);
    rx
}

fn live_count<T>(subscribers: &Subscribers<T>, key: &str) -> usize {
    subscribers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
}

async fn fan_out<T: Clone + Send>(subscribers: &Subscribers<T>, key: &str, message: T) -> usize {
    // Clone the senders out so the lock isn't held across the sends.
    let senders: Vec<mpsc::Sender<T>> = {
        let mut map = subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(key) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.clone()
            }
            None => return 0,
        }
    };

    let mut delivered = 0;
    for tx in senders {
        if tx.send(message.clone()).await.is_ok() {
            delivered += 1;
        }
    }
    delivered
}
