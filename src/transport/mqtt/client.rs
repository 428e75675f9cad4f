//! MQTT transport client and its background receive loop
//!
//! One background task drives the rumqttc event loop for the lifetime of the
//! connection: it forwards every inbound publish over an mpsc channel to the
//! dispatch loop, tracks connection state on a watch channel, and exits after
//! the in-flight iteration once the shutdown flag is set. A poll error never
//! terminates the loop; it is logged and polling resumes after a short delay.

use super::connection::{configure_mqtt_options, to_mqtt_qos, ConnectionState};
use crate::config::RpcConfig;
use crate::transport::{InboundMessage, QosLevel, Transport, TransportError};
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::{AsyncClient, Event};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const INBOUND_CHANNEL_CAPACITY: usize = 64;
const CONNACK_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_ERROR_DELAY: Duration = Duration::from_millis(250);

/// MQTT transport backed by rumqttc
pub struct MqttTransport {
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    event_loop_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Connect to the broker and start the receive loop.
    ///
    /// Returns the transport plus the channel on which every inbound message
    /// is delivered. Resolves only once the broker's ConnAck arrives; a
    /// missing confirmation within the deadline is a connection failure.
    pub async fn connect(
        instance_id: &str,
        config: &RpcConfig,
    ) -> Result<(Self, mpsc::Receiver<InboundMessage>), TransportError> {
        let options =
            configure_mqtt_options(instance_id, &config.host, config.port, config.keep_alive_secs);
        let (client, mut event_loop) = AsyncClient::new(options, 10);

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Shutdown flag takes priority over event processing
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    event = event_loop.poll() => match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            debug!("broker acknowledged connection");
                            let _ = state_tx.send(ConnectionState::Connected);
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            if publish.retain {
                                debug!("ignoring retained message");
                                continue;
                            }
                            let message = InboundMessage {
                                topic: String::from_utf8_lossy(&publish.topic).to_string(),
                                payload: publish.payload.to_vec(),
                            };
                            // Receiver gone means the dispatch loop is done
                            if inbound_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Ok(Event::Incoming(Packet::Disconnect(_))) => {
                            let _ = state_tx.send(ConnectionState::Disconnected(
                                "disconnected by broker".to_string(),
                            ));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("mqtt event loop error: {}", e);
                            let _ = state_tx.send(ConnectionState::Disconnected(e.to_string()));
                            // rumqttc re-establishes the session on the next poll
                            tokio::time::sleep(POLL_ERROR_DELAY).await;
                        }
                    }
                }
            }
            debug!("mqtt event loop stopped");
        });

        let transport = Self {
            client,
            state_rx: state_rx.clone(),
            shutdown_tx,
            event_loop_handle: StdMutex::new(Some(handle)),
        };

        wait_for_connection_confirmation(state_rx, CONNACK_TIMEOUT).await?;
        info!(host = %config.host, port = config.port, "connected to broker");
        Ok((transport, inbound_rx))
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    fn check_connection_state(&self) -> Result<(), TransportError> {
        let state = self.connection_state();
        if state != ConnectionState::Connected {
            return Err(TransportError::NotConnected { state });
        }
        Ok(())
    }
}

/// Wait until the state channel reports `Connected`, failing fast on an
/// explicit disconnect
async fn wait_for_connection_confirmation(
    mut state_rx: watch::Receiver<ConnectionState>,
    timeout: Duration,
) -> Result<(), TransportError> {
    let wait = tokio::time::timeout(timeout, async {
        loop {
            match &*state_rx.borrow() {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected(reason) => {
                    return Err(TransportError::ConnectionFailed(reason.clone()));
                }
                ConnectionState::Connecting => {}
            }
            if state_rx.changed().await.is_err() {
                return Err(TransportError::ConnectionFailed(
                    "state channel closed".to_string(),
                ));
            }
        }
    })
    .await;

    match wait {
        Ok(result) => result,
        Err(_) => Err(TransportError::ConnectionFailed(
            "no ConnAck within deadline".to_string(),
        )),
    }
}

#[async_trait::async_trait]
impl Transport for MqttTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QosLevel,
    ) -> Result<(), TransportError> {
        self.check_connection_state()?;
        self.client
            .publish(topic, to_mqtt_qos(qos), false, payload)
            .await
            .map_err(|e| TransportError::PublishFailed(Box::new(e)))
    }

    async fn subscribe(&self, topic: &str, qos: QosLevel) -> Result<(), TransportError> {
        self.check_connection_state()?;
        self.client
            .subscribe(topic, to_mqtt_qos(qos))
            .await
            .map_err(|e| TransportError::SubscriptionFailed(Box::new(e)))
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.check_connection_state()?;
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| TransportError::SubscriptionFailed(Box::new(e)))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.client.disconnect().await {
            debug!("broker disconnect failed: {}", e);
        }

        let handle = self
            .event_loop_handle
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => debug!("event loop shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => warn!("event loop ended with error: {}", e),
                Err(_) => warn!("event loop did not stop within deadline, aborting"),
                _ => {}
            }
        }

        info!("mqtt transport disconnected");
        Ok(())
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        // Callers should disconnect() explicitly; this only stops the
        // background task when they did not.
        let _ = self.shutdown_tx.send(true);
        if let Ok(mut guard) = self.event_loop_handle.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
