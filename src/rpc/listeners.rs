//! Listener registry: broadcast consumers keyed by derived topic
//!
//! Each topic entry holds the mutable consumer set plus an immutable live
//! snapshot that is replaced, never mutated in place, on every registration
//! change. Delivery iterates a snapshot outside the lock, so a concurrent
//! add/remove never exposes a half-modified set.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Consumer of broadcast messages for a logical listener topic
///
/// A failing consumer is isolated: its error is logged and delivery continues
/// with the rest of the snapshot.
pub trait RpcListener: Send + Sync {
    fn on_message(&self, payload: &[u8]) -> Result<(), String>;
}

type LiveSet = Arc<[Arc<dyn RpcListener>]>;

struct ListenerTopic {
    consumers: Vec<Arc<dyn RpcListener>>,
    live: LiveSet,
}

impl ListenerTopic {
    fn refresh_live(&mut self) {
        self.live = self.consumers.clone().into();
    }
}

/// Outcome of adding a consumer, used by the client to drive transport
/// subscriptions
#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// First consumer for this topic; the caller must subscribe on the
    /// transport
    FirstForTopic,
    Added,
    /// Consumer was already registered for this topic; state unchanged
    Duplicate,
}

/// Outcome of removing a consumer
#[derive(Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// The set is empty after removal; the caller must unsubscribe on the
    /// transport
    LastRemoved,
    NotFound,
}

/// Registry of broadcast consumers, shared between registration calls and the
/// dispatch loop
pub struct ListenerRegistry {
    topics: Mutex<HashMap<String, ListenerTopic>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Add a consumer under a topic. Consumer identity is `Arc` pointer
    /// identity; adding the same `Arc` twice is a no-op.
    pub async fn add(&self, topic: &str, listener: Arc<dyn RpcListener>) -> AddOutcome {
        let mut topics = self.topics.lock().await;
        match topics.get_mut(topic) {
            Some(entry) => {
                if entry.consumers.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                    return AddOutcome::Duplicate;
                }
                entry.consumers.push(listener);
                entry.refresh_live();
                AddOutcome::Added
            }
            None => {
                let mut entry = ListenerTopic {
                    consumers: vec![listener],
                    live: Vec::new().into(),
                };
                entry.refresh_live();
                topics.insert(topic.to_string(), entry);
                AddOutcome::FirstForTopic
            }
        }
    }

    /// Remove a consumer from a topic. Emptiness is checked strictly after
    /// removal; only a then-empty set reports `LastRemoved`.
    pub async fn remove(&self, topic: &str, listener: &Arc<dyn RpcListener>) -> RemoveOutcome {
        let mut topics = self.topics.lock().await;
        let Some(entry) = topics.get_mut(topic) else {
            return RemoveOutcome::NotFound;
        };

        let before = entry.consumers.len();
        entry.consumers.retain(|l| !Arc::ptr_eq(l, listener));
        if entry.consumers.len() == before {
            return RemoveOutcome::NotFound;
        }

        if entry.consumers.is_empty() {
            topics.remove(topic);
            RemoveOutcome::LastRemoved
        } else {
            entry.refresh_live();
            RemoveOutcome::Removed
        }
    }

    /// Deliver a payload to the live snapshot for a topic; messages for
    /// topics with no snapshot are dropped. Returns the number of consumers
    /// invoked.
    pub async fn deliver(&self, topic: &str, payload: &[u8]) -> usize {
        let live: Option<LiveSet> = {
            let topics = self.topics.lock().await;
            topics.get(topic).map(|entry| entry.live.clone())
        };

        let Some(live) = live else {
            debug!(topic = %topic, "no listeners for topic, dropping message");
            return 0;
        };

        for listener in live.iter() {
            if let Err(e) = listener.on_message(payload) {
                warn!(topic = %topic, "listener failed: {}", e);
            }
        }
        live.len()
    }

    /// Number of registered topics (not consumers)
    pub async fn topic_count(&self) -> usize {
        self.topics.lock().await.len()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
