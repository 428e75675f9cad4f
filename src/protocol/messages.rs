//! RPC wire documents
//!
//! The request/reply payload is an opaque structured JSON document beyond the
//! fields defined here. Replies are matched to waiting callers by the `id`
//! field; broadcast/listener messages carry no `id` at all.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Outbound RPC request document
///
/// The correlation id is generated once per request and never reused while the
/// request is pending. `token`, `username`, and `replytopic` are context
/// fields attached by the connection immediately before publish.
///
/// # Examples
/// ```
/// use mqrpc::protocol::RpcRequest;
/// use serde_json::json;
///
/// let request = RpcRequest::new("PathBiz", "put", Some(json!({"key": "k1"})));
/// assert_eq!(request.method, "put");
/// assert!(request.replytopic.is_none()); // attached at publish time
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    /// Correlation id (uuid-v4 hex), unique per request
    pub id: String,
    /// Target class providing the invoked method
    pub classname: String,
    /// Method name to invoke
    pub method: String,
    /// Method arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Caller-side deadline in milliseconds, advisory for the peer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Authentication token, attached before publish
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Requesting identity, attached before publish
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Private reply topic of the issuing connection, attached before publish
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replytopic: Option<String>,
}

impl RpcRequest {
    /// Create a request with a fresh correlation id
    pub fn new(classname: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            classname: classname.into(),
            method: method.into(),
            params,
            timeout: None,
            token: None,
            username: None,
            replytopic: None,
        }
    }
}

/// Inbound RPC reply document
///
/// `result` and `error` are mutually exclusive. The error payload is carried
/// verbatim; translating it into a caller-side error representation is the
/// invocation wrapper's job, not the dispatch engine's.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcReply {
    /// Correlation id of the request this reply answers
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RpcReply {
    /// Create a successful reply
    pub fn result(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error reply
    pub fn error(id: impl Into<String>, error: Value) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// True when the reply carries an error payload
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
