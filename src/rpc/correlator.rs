//! Request correlator: pending outbound requests keyed by correlation id
//!
//! Each pending request is a one-shot channel; the dispatch loop completes it
//! when the matching reply arrives, and the issuing caller awaits the other
//! end under its own deadline. All map access is a single critical section
//! shared between callers and the one receive loop.

use crate::error::RpcError;
use crate::protocol::RpcReply;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

/// Tracks pending requests and hands replies to waiting callers
pub struct Correlator {
    pending: Mutex<HashMap<String, oneshot::Sender<RpcReply>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a pending request and return the wait handle for its reply.
    ///
    /// Each id is present at most once; registering an id that is already in
    /// flight is an error rather than a silent replacement of the first
    /// caller's wait handle.
    pub async fn register(&self, id: &str) -> Result<oneshot::Receiver<RpcReply>, RpcError> {
        let mut pending = self.pending.lock().await;
        match pending.entry(id.to_string()) {
            Entry::Occupied(_) => Err(RpcError::DuplicateId(id.to_string())),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel();
                entry.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Deliver a reply to the caller waiting on its id.
    ///
    /// Returns false when no entry exists (late or duplicate reply, or the
    /// caller already timed out); such replies are dropped silently.
    pub async fn complete(&self, reply: RpcReply) -> bool {
        let sender = {
            let mut pending = self.pending.lock().await;
            pending.remove(&reply.id)
        };

        match sender {
            Some(tx) => {
                let id = reply.id.clone();
                if tx.send(reply).is_err() {
                    // Caller gave up between map removal and the send
                    debug!(id = %id, "reply arrived after caller gave up");
                    return false;
                }
                true
            }
            None => {
                debug!(id = %reply.id, "dropping reply with no pending entry");
                false
            }
        }
    }

    /// Remove a pending entry without delivering anything (timeout or publish
    /// failure); a subsequently arriving reply for the id is dropped.
    pub async fn abandon(&self, id: &str) -> bool {
        self.pending.lock().await.remove(id).is_some()
    }

    /// Drop every pending entry. Waiting callers observe a closed wait handle.
    pub async fn drain(&self) {
        self.pending.lock().await.clear();
    }

    /// Number of requests currently awaiting a reply
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
