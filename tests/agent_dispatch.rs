//! Agent-mode behavior through the client API
//!
//! An agent-mode client subscribes its agent-request topic and answers
//! inbound requests by publishing to the shared result topic. The agent path
//! and the caller path coexist on one connection without interfering.

use mqrpc::protocol::{RpcReply, RpcRequest, RESULT_TOPIC};
use mqrpc::testing::mocks::{EchoHandler, MockTransport};
use mqrpc::transport::InboundMessage;
use mqrpc::{RequestHandler, RpcClient, RpcConfig, RpcError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const AGENT_TOPIC: &str = "/__rpc/request/agent/grid-1";

async fn agent_client(
    transport: Arc<MockTransport>,
    handler: Arc<dyn RequestHandler>,
) -> (RpcClient, mpsc::Sender<InboundMessage>) {
    let (tx, rx) = mpsc::channel(16);
    let mut config = RpcConfig::new("grid-1");
    config.agent = true;
    config.agent_workers = 2;
    let client = RpcClient::with_transport(transport, rx, &config, Some(handler))
        .await
        .unwrap();
    (client, tx)
}

#[tokio::test]
async fn agent_mode_subscribes_agent_request_topic() {
    let transport = Arc::new(MockTransport::new());
    let (_client, _tx) = agent_client(transport.clone(), Arc::new(EchoHandler)).await;

    let subs = transport.get_subscriptions().await;
    assert!(subs.contains(&AGENT_TOPIC.to_string()), "got: {subs:?}");
}

#[tokio::test]
async fn inbound_agent_request_publishes_result() {
    let transport = Arc::new(MockTransport::new());
    let (_client, tx) = agent_client(transport.clone(), Arc::new(EchoHandler)).await;

    let request = RpcRequest::new("TemperatureBiz", "query", Some(json!([3])));
    let id = request.id.clone();
    tx.send(InboundMessage {
        topic: AGENT_TOPIC.to_string(),
        payload: serde_json::to_vec(&request).unwrap(),
    })
    .await
    .unwrap();

    let published = transport.wait_for_publish(1).await;
    assert_eq!(published[0].0, RESULT_TOPIC);
    let result: Value = serde_json::from_slice(&published[0].1).unwrap();
    assert_eq!(result["id"], json!(id));
    assert_eq!(result["echo"], json!([3]));
}

#[tokio::test]
async fn agent_request_never_touches_pending_map() {
    let transport = Arc::new(MockTransport::new());
    let (client, tx) = agent_client(transport.clone(), Arc::new(EchoHandler)).await;

    let request = RpcRequest::new("TemperatureBiz", "query", None);
    tx.send(InboundMessage {
        topic: AGENT_TOPIC.to_string(),
        payload: serde_json::to_vec(&request).unwrap(),
    })
    .await
    .unwrap();

    transport.wait_for_publish(1).await;
    assert_eq!(client.pending_requests().await, 0);
}

#[tokio::test]
async fn handler_returning_none_publishes_nothing() {
    struct Silent;
    #[async_trait::async_trait]
    impl RequestHandler for Silent {
        async fn handle(&self, _request: RpcRequest) -> Option<Value> {
            None
        }
    }

    let transport = Arc::new(MockTransport::new());
    let (_client, tx) = agent_client(transport.clone(), Arc::new(Silent)).await;

    let request = RpcRequest::new("TemperatureBiz", "query", None);
    tx.send(InboundMessage {
        topic: AGENT_TOPIC.to_string(),
        payload: serde_json::to_vec(&request).unwrap(),
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(transport.get_published().await.is_empty());
}

#[tokio::test]
async fn agent_and_caller_paths_share_one_connection() {
    let transport = Arc::new(MockTransport::new());
    let (client, tx) = agent_client(transport.clone(), Arc::new(EchoHandler)).await;

    // Outbound call resolved by a peer reply
    let request = RpcRequest::new("PathBiz", "get", Some(json!("x")));
    let peer_transport = transport.clone();
    let peer_tx = tx.clone();
    tokio::spawn(async move {
        let published = peer_transport.wait_for_publish(1).await;
        let sent: RpcRequest = serde_json::from_slice(&published[0].1).unwrap();
        let reply = RpcReply::result(&sent.id, json!("reply"));
        let _ = peer_tx
            .send(InboundMessage {
                topic: sent.replytopic.unwrap(),
                payload: serde_json::to_vec(&reply).unwrap(),
            })
            .await;
    });

    let reply = client
        .execute(request, Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(reply.result, Some(json!("reply")));

    // Inbound agent request on the same connection still dispatches
    let inbound = RpcRequest::new("TemperatureBiz", "query", Some(json!([1])));
    tx.send(InboundMessage {
        topic: AGENT_TOPIC.to_string(),
        payload: serde_json::to_vec(&inbound).unwrap(),
    })
    .await
    .unwrap();

    let published = transport.wait_for_publish(2).await;
    assert_eq!(published[1].0, RESULT_TOPIC);
}

#[tokio::test]
async fn connect_in_agent_mode_without_handler_is_a_config_error() {
    let mut config = RpcConfig::new("grid-1");
    config.agent = true;

    let result = RpcClient::connect(config).await;
    assert!(matches!(result, Err(RpcError::Config(_))));
}
