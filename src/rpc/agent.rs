//! Agent dispatcher: inbound requests handled by this connection
//!
//! Active only for connections constructed in agent mode. Each inbound
//! request on the agent-request topic runs in its own task, bounded by a
//! semaphore-backed worker pool. When the pool is saturated the request is
//! rejected (logged and dropped) rather than queued; the receive loop never
//! blocks on the agent path, and the agent path never touches the pending
//! request map.

use crate::protocol::{RpcRequest, RESULT_TOPIC};
use crate::transport::{QosLevel, Transport};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Handler for inbound agent requests
///
/// Returning `Some(value)` publishes the value to the shared result topic;
/// `None` reports nothing.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: RpcRequest) -> Option<Value>;
}

/// Routes inbound agent requests to the local handler through a bounded
/// worker pool
pub struct AgentDispatcher {
    handler: Arc<dyn RequestHandler>,
    transport: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
}

impl AgentDispatcher {
    pub fn new(
        handler: Arc<dyn RequestHandler>,
        transport: Arc<dyn Transport>,
        workers: usize,
    ) -> Self {
        Self {
            handler,
            transport,
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Decode an inbound agent request and spawn a handler task for it.
    /// Never blocks the caller (the receive loop).
    pub fn dispatch(&self, payload: &[u8]) {
        let request: RpcRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("dropping malformed agent request: {}", e);
                return;
            }
        };

        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(id = %request.id, "agent worker pool saturated, rejecting request");
                return;
            }
        };

        let handler = self.handler.clone();
        let transport = self.transport.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let id = request.id.clone();
            debug!(id = %id, classname = %request.classname, method = %request.method,
                "handling agent request");

            let Some(result) = handler.handle(request).await else {
                return;
            };

            let payload = match serde_json::to_vec(&result) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(id = %id, "failed to encode agent result: {}", e);
                    return;
                }
            };
            if let Err(e) = transport
                .publish(RESULT_TOPIC, payload, QosLevel::ExactlyOnce)
                .await
            {
                warn!(id = %id, "failed to publish agent result: {}", e);
            }
        });
    }

    /// Number of currently idle workers
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct CountingHandler {
        calls: AtomicUsize,
        release: Notify,
        block: bool,
    }

    impl CountingHandler {
        fn new(block: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                release: Notify::new(),
                block,
            })
        }
    }

    #[async_trait::async_trait]
    impl RequestHandler for CountingHandler {
        async fn handle(&self, request: RpcRequest) -> Option<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.block {
                self.release.notified().await;
            }
            Some(json!({"id": request.id, "echo": request.params}))
        }
    }

    fn request_payload() -> Vec<u8> {
        let request = RpcRequest::new("Foo", "bar", Some(json!([1])));
        serde_json::to_vec(&request).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_invokes_handler_and_publishes_result() {
        let handler = CountingHandler::new(false);
        let transport = Arc::new(MockTransport::new());
        let dispatcher = AgentDispatcher::new(handler.clone(), transport.clone(), 2);

        dispatcher.dispatch(&request_payload());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        let published = transport.get_published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, RESULT_TOPIC);
        assert_eq!(published[0].2, QosLevel::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_malformed_request_is_dropped() {
        let handler = CountingHandler::new(false);
        let transport = Arc::new(MockTransport::new());
        let dispatcher = AgentDispatcher::new(handler.clone(), transport, 2);

        dispatcher.dispatch(b"not json");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_saturated_pool_rejects_request() {
        let handler = CountingHandler::new(true);
        let transport = Arc::new(MockTransport::new());
        let dispatcher = AgentDispatcher::new(handler.clone(), transport, 1);

        dispatcher.dispatch(&request_payload());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(dispatcher.available_workers(), 0);

        // Pool exhausted: this one is rejected, not queued
        dispatcher.dispatch(&request_payload());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        // Releasing the worker frees the pool for new requests
        handler.release.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(dispatcher.available_workers(), 1);

        dispatcher.dispatch(&request_payload());
        handler.release.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }
}
