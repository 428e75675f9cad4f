//! Transport layer for RPC communication
//!
//! This module provides a thin pub/sub abstraction and the MQTT
//! implementation. The dispatch engine depends only on the `Transport` trait
//! plus an inbound-message channel, which keeps the correlation and routing
//! logic testable without a broker.

use thiserror::Error;

pub mod mqtt;

/// Quality-of-service level for publish/subscribe operations
///
/// Delivery guarantees are entirely delegated to the transport; the RPC core
/// only adds correlation and routing on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    AtMostOnce,
    AtLeastOnce,
    /// Used for all request/reply/result traffic
    ExactlyOnce,
}

/// A message delivered by the transport to the receive loop
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Transport-level errors
///
/// Publish and connect failures are reported synchronously to the caller;
/// the transport does not retry. Retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("publish failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("subscription failed")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("not connected - current state: {state:?}")]
    NotConnected { state: mqtt::ConnectionState },
}

/// Pub/sub transport contract
///
/// Inbound delivery is not part of this trait: implementations hand the
/// receive side an `mpsc::Receiver<InboundMessage>` at connect time, which the
/// client's dispatch loop consumes.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Publish a payload to a topic
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QosLevel,
    ) -> Result<(), TransportError>;

    /// Subscribe to a topic
    async fn subscribe(&self, topic: &str, qos: QosLevel) -> Result<(), TransportError>;

    /// Unsubscribe from a topic
    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Disconnect from the broker and stop the receive loop
    async fn disconnect(&self) -> Result<(), TransportError>;
}
