//! RPC connection: public API surface and the inbound dispatch loop
//!
//! An `RpcClient` owns one transport connection, one dispatch task, and the
//! instance-scoped correlation state. Nothing is shared across connection
//! instances; the reply topic embeds a process-unique id so replies are never
//! misrouted between connections on the same broker.

use crate::config::{ConfigError, RpcConfig};
use crate::error::{RpcError, RpcResult};
use crate::protocol::{RpcReply, RpcRequest, TopicBuilder, RESULT_TOPIC};
use crate::rpc::agent::{AgentDispatcher, RequestHandler};
use crate::rpc::correlator::Correlator;
use crate::rpc::listeners::{AddOutcome, ListenerRegistry, RemoveOutcome, RpcListener};
use crate::transport::mqtt::MqttTransport;
use crate::transport::{InboundMessage, QosLevel, Transport};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// RPC connection over a pub/sub transport
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    correlator: Arc<Correlator>,
    listeners: Arc<ListenerRegistry>,
    request_topic: String,
    reply_topic: String,
    username: Option<String>,
    token: Option<String>,
    closed: AtomicBool,
    dispatch_handle: StdMutex<Option<JoinHandle<()>>>,
}

/// Routes each inbound message to exactly one consumer: the agent dispatcher,
/// the correlator, or the listener registry
struct Dispatcher {
    reply_topic: String,
    agent_request_topic: String,
    correlator: Arc<Correlator>,
    listeners: Arc<ListenerRegistry>,
    agent: Option<AgentDispatcher>,
}

impl Dispatcher {
    async fn handle_message(&self, message: InboundMessage) {
        // Agent requests are a fully separate route keyed by topic identity;
        // they never touch the pending-request map.
        if let Some(agent) = &self.agent {
            if message.topic == self.agent_request_topic {
                agent.dispatch(&message.payload);
                return;
            }
        }

        if message.topic == self.reply_topic {
            match serde_json::from_slice::<RpcReply>(&message.payload) {
                Ok(reply) => {
                    let _ = self.correlator.complete(reply).await;
                }
                Err(e) => warn!("dropping malformed reply: {}", e),
            }
            return;
        }

        self.listeners.deliver(&message.topic, &message.payload).await;
    }
}

impl RpcClient {
    /// Connect to the broker in caller mode.
    ///
    /// Agent mode needs a handler; use [`RpcClient::connect_with_handler`].
    pub async fn connect(config: RpcConfig) -> RpcResult<Self> {
        if config.agent {
            return Err(ConfigError::InvalidConfig(
                "agent mode requires a request handler; use connect_with_handler".to_string(),
            )
            .into());
        }
        config.validate()?;

        let instance_id = TopicBuilder::new_instance_id();
        let (transport, inbound) = MqttTransport::connect(&instance_id, &config).await?;
        Self::with_transport(Arc::new(transport), inbound, &config, None).await
    }

    /// Connect to the broker in agent mode: the connection additionally
    /// subscribes its agent-request topic and hands inbound requests to
    /// `handler`.
    pub async fn connect_with_handler(
        mut config: RpcConfig,
        handler: Arc<dyn RequestHandler>,
    ) -> RpcResult<Self> {
        config.agent = true;
        config.validate()?;

        let instance_id = TopicBuilder::new_instance_id();
        let (transport, inbound) = MqttTransport::connect(&instance_id, &config).await?;
        Self::with_transport(Arc::new(transport), inbound, &config, Some(handler)).await
    }

    /// Build a client on an already-connected transport and its inbound
    /// channel. This is the seam used by tests and alternate transports.
    pub async fn with_transport(
        transport: Arc<dyn Transport>,
        mut inbound: mpsc::Receiver<InboundMessage>,
        config: &RpcConfig,
        handler: Option<Arc<dyn RequestHandler>>,
    ) -> RpcResult<Self> {
        config.validate()?;

        let instance_id = TopicBuilder::new_instance_id();
        let reply_topic = TopicBuilder::reply_topic(&instance_id);
        let request_topic = TopicBuilder::request_topic(&config.server_id);
        let agent_request_topic = TopicBuilder::agent_request_topic(&config.server_id);

        let correlator = Arc::new(Correlator::new());
        let listeners = Arc::new(ListenerRegistry::new());

        // The reply subscription exists before any request can be published
        transport
            .subscribe(&reply_topic, QosLevel::ExactlyOnce)
            .await?;

        let agent = match (config.agent, handler) {
            (true, Some(handler)) => {
                transport
                    .subscribe(&agent_request_topic, QosLevel::ExactlyOnce)
                    .await?;
                Some(AgentDispatcher::new(
                    handler,
                    transport.clone(),
                    config.agent_workers,
                ))
            }
            _ => None,
        };

        let dispatcher = Dispatcher {
            reply_topic: reply_topic.clone(),
            agent_request_topic,
            correlator: correlator.clone(),
            listeners: listeners.clone(),
            agent,
        };

        let dispatch_handle = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                dispatcher.handle_message(message).await;
            }
            debug!("dispatch loop stopped");
        });

        info!(
            server_id = %config.server_id,
            reply_topic = %reply_topic,
            agent = config.agent,
            "rpc client ready"
        );

        Ok(Self {
            transport,
            correlator,
            listeners,
            request_topic,
            reply_topic,
            username: config.username.clone(),
            token: config.token(),
            closed: AtomicBool::new(false),
            dispatch_handle: StdMutex::new(Some(dispatch_handle)),
        })
    }

    /// Execute a request and block until the matching reply arrives or the
    /// timeout elapses.
    ///
    /// A timeout is a distinct outcome from a semantically empty reply; the
    /// pending entry is removed on timeout so a late reply is dropped. A
    /// publish failure resolves the request immediately rather than waiting
    /// out the deadline. An error reply is returned as-is; translating its
    /// payload is the invocation wrapper's job.
    pub async fn execute(&self, mut request: RpcRequest, timeout: Duration) -> RpcResult<RpcReply> {
        if self.is_closed() {
            return Err(RpcError::Closed);
        }

        request.token = self.token.clone();
        request.username = self.username.clone();
        request.replytopic = Some(self.reply_topic.clone());
        if request.timeout.is_none() {
            request.timeout = Some(timeout.as_millis() as u64);
        }
        let payload = serde_json::to_vec(&request).map_err(RpcError::Malformed)?;

        // The pending entry must be visible to the dispatch path before the
        // publish reaches the transport; a fast peer's reply can otherwise
        // race the registration.
        let id = request.id.clone();
        let reply_rx = self.correlator.register(&id).await?;

        if let Err(e) = self
            .transport
            .publish(&self.request_topic, payload, QosLevel::ExactlyOnce)
            .await
        {
            self.correlator.abandon(&id).await;
            return Err(e.into());
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // Wait handle closed: the connection drained its pending state
            Ok(Err(_)) => Err(RpcError::Closed),
            Err(_) => {
                self.correlator.abandon(&id).await;
                Err(RpcError::timeout(id, timeout.as_millis() as u64))
            }
        }
    }

    /// Publish a result document to the shared result topic
    pub async fn send_result(&self, result: &Value) -> RpcResult<()> {
        if self.is_closed() {
            return Err(RpcError::Closed);
        }
        let payload = serde_json::to_vec(result).map_err(RpcError::Malformed)?;
        self.transport
            .publish(RESULT_TOPIC, payload, QosLevel::ExactlyOnce)
            .await?;
        Ok(())
    }

    /// Register a broadcast consumer under a logical listener name.
    ///
    /// The first consumer for a name subscribes the derived topic on the
    /// transport. Adding the same consumer twice for one name is a no-op, as
    /// is an empty name.
    pub async fn add_listener(&self, name: &str, listener: Arc<dyn RpcListener>) -> RpcResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        let topic = TopicBuilder::listener_topic(name);

        match self.listeners.add(&topic, listener.clone()).await {
            AddOutcome::FirstForTopic => {
                if let Err(e) = self.transport.subscribe(&topic, QosLevel::ExactlyOnce).await {
                    // Roll back so a retry starts from a clean slate
                    self.listeners.remove(&topic, &listener).await;
                    return Err(e.into());
                }
                Ok(())
            }
            AddOutcome::Added | AddOutcome::Duplicate => Ok(()),
        }
    }

    /// Remove a broadcast consumer. Unsubscribes the derived topic once no
    /// consumers remain after the removal.
    pub async fn remove_listener(
        &self,
        name: &str,
        listener: &Arc<dyn RpcListener>,
    ) -> RpcResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        let topic = TopicBuilder::listener_topic(name);

        match self.listeners.remove(&topic, listener).await {
            RemoveOutcome::LastRemoved => {
                self.transport.unsubscribe(&topic).await?;
                Ok(())
            }
            RemoveOutcome::Removed | RemoveOutcome::NotFound => Ok(()),
        }
    }

    /// Close the connection: drain pending requests (their callers observe
    /// `RpcError::Closed`), disconnect the transport, and stop the dispatch
    /// loop. Idempotent.
    pub async fn close(&self) -> RpcResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.correlator.drain().await;
        self.transport.disconnect().await?;

        let handle = self
            .dispatch_handle
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                warn!("dispatch loop did not stop within deadline");
            }
        }

        info!("rpc client closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of requests currently awaiting a reply
    pub async fn pending_requests(&self) -> usize {
        self.correlator.pending_count().await
    }

    /// Private reply topic of this connection instance
    pub fn reply_topic(&self) -> &str {
        &self.reply_topic
    }

    /// Request topic this connection publishes to
    pub fn request_topic(&self) -> &str {
        &self.request_topic
    }
}
