//! mqrpc - synchronous request/reply RPC over MQTT
//!
//! This crate layers blocking request/reply semantics on top of an
//! asynchronous MQTT publish/subscribe transport:
//! - Requests carry a unique correlation id and are published to a well-known
//!   request topic; the caller awaits the matching reply on a private,
//!   per-connection reply topic.
//! - Fire-and-forget broadcast listeners keyed by logical topic name.
//! - An agent mode in which the connection itself handles inbound requests
//!   through a bounded worker pool.
//!
//! # Quick Start
//!
//! ```rust
//! use mqrpc::protocol::RpcRequest;
//! use serde_json::json;
//!
//! // Build a request; the correlation id is generated once per request.
//! let request = RpcRequest::new("TemperatureBiz", "query", Some(json!([1, 2])));
//! assert_eq!(request.classname, "TemperatureBiz");
//! assert!(!request.id.is_empty());
//!
//! // Requests serialize to JSON for MQTT transport.
//! let wire = serde_json::to_string(&request).unwrap();
//! assert!(wire.contains("\"method\":\"query\""));
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod rpc;
pub mod testing;
pub mod transport;

pub use config::RpcConfig;
pub use error::{RpcError, RpcResult};
pub use protocol::{RpcReply, RpcRequest};
pub use rpc::{RequestHandler, RpcClient, RpcInvoker, RpcListener};
pub use transport::mqtt::MqttTransport;
pub use transport::{QosLevel, Transport};
