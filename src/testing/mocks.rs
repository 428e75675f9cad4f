//! In-memory transport and consumer doubles
//!
//! `MockTransport` records every operation instead of talking to a broker;
//! inbound traffic is injected by tests through the mpsc channel the client
//! was constructed with.

use crate::protocol::RpcRequest;
use crate::rpc::agent::RequestHandler;
use crate::rpc::listeners::RpcListener;
use crate::transport::{QosLevel, Transport, TransportError};
use serde_json::{json, Value};
use std::io;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Transport double that records publishes and subscriptions
pub struct MockTransport {
    published: Mutex<Vec<(String, Vec<u8>, QosLevel)>>,
    subscriptions: Mutex<Vec<String>>,
    unsubscriptions: Mutex<Vec<String>>,
    should_fail: bool,
    fail_publish: bool,
    disconnected: Mutex<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            unsubscriptions: Mutex::new(Vec::new()),
            should_fail: false,
            fail_publish: false,
            disconnected: Mutex::new(false),
        }
    }

    /// A transport whose publish/subscribe operations all fail
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    /// A transport that accepts subscriptions but fails every publish
    pub fn with_publish_failure() -> Self {
        Self {
            fail_publish: true,
            ..Self::new()
        }
    }

    pub async fn get_published(&self) -> Vec<(String, Vec<u8>, QosLevel)> {
        self.published.lock().await.clone()
    }

    pub async fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.clone()
    }

    pub async fn get_unsubscriptions(&self) -> Vec<String> {
        self.unsubscriptions.lock().await.clone()
    }

    pub async fn is_disconnected(&self) -> bool {
        *self.disconnected.lock().await
    }

    /// Wait until at least `count` messages have been published and return a
    /// snapshot of everything published so far
    pub async fn wait_for_publish(&self, count: usize) -> Vec<(String, Vec<u8>, QosLevel)> {
        loop {
            {
                let published = self.published.lock().await;
                if published.len() >= count {
                    return published.clone();
                }
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    fn fail(&self) -> TransportError {
        TransportError::PublishFailed(Box::new(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "mock transport failure",
        )))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QosLevel,
    ) -> Result<(), TransportError> {
        if self.should_fail || self.fail_publish {
            return Err(self.fail());
        }
        self.published
            .lock()
            .await
            .push((topic.to_string(), payload, qos));
        Ok(())
    }

    async fn subscribe(&self, topic: &str, _qos: QosLevel) -> Result<(), TransportError> {
        if self.should_fail {
            return Err(TransportError::SubscriptionFailed(Box::new(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock transport failure",
            ))));
        }
        self.subscriptions.lock().await.push(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.unsubscriptions.lock().await.push(topic.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        *self.disconnected.lock().await = true;
        Ok(())
    }
}

/// Listener double that records received payloads
pub struct RecordingListener {
    received: StdMutex<Vec<Vec<u8>>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            received: StdMutex::new(Vec::new()),
        })
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Wait until at least `count` payloads have been delivered
    pub async fn wait_for(&self, count: usize) -> Vec<Vec<u8>> {
        loop {
            {
                let received = self.received.lock().unwrap();
                if received.len() >= count {
                    return received.clone();
                }
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

impl RpcListener for RecordingListener {
    // on_message runs on the dispatch loop, so this stays synchronous
    fn on_message(&self, payload: &[u8]) -> Result<(), String> {
        self.received
            .lock()
            .map_err(|_| "recording listener lock poisoned".to_string())?
            .push(payload.to_vec());
        Ok(())
    }
}

/// Handler double that echoes the request params back as its result
pub struct EchoHandler;

#[async_trait::async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, request: RpcRequest) -> Option<Value> {
        Some(json!({"id": request.id, "echo": request.params}))
    }
}
