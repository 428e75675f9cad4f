//! Typed invocation wrapper around a connection
//!
//! An `RpcInvoker` binds a connection to one remote class and turns error
//! replies into `RpcError::Remote`, so call sites deal with
//! `Result<Option<Value>>` instead of inspecting reply documents.

use crate::error::{RpcError, RpcResult};
use crate::protocol::RpcRequest;
use crate::rpc::client::RpcClient;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Default per-call deadline when the caller does not override it
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Invokes methods on one remote class over a shared connection
pub struct RpcInvoker {
    client: Arc<RpcClient>,
    classname: String,
    timeout: Duration,
}

impl RpcInvoker {
    pub fn new(client: Arc<RpcClient>, classname: impl Into<String>) -> Self {
        Self {
            client,
            classname: classname.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-call deadline for every invocation through this
    /// invoker
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Invoke a method and return its result payload.
    ///
    /// A reply carrying an error payload becomes `RpcError::Remote`; a
    /// successful reply with no result payload is `Ok(None)`.
    pub async fn invoke(&self, method: &str, params: Option<Value>) -> RpcResult<Option<Value>> {
        self.invoke_with_timeout(method, params, self.timeout).await
    }

    /// Invoke a method under an explicit deadline
    pub async fn invoke_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> RpcResult<Option<Value>> {
        let request = RpcRequest::new(self.classname.clone(), method, params);
        let reply = self.client.execute(request, timeout).await?;

        match reply.error {
            Some(error) => Err(RpcError::remote(reply.id, error)),
            None => Ok(reply.result),
        }
    }

    pub fn classname(&self) -> &str {
        &self.classname
    }
}
