//! Topic conventions and server id validation
//!
//! All RPC traffic lives under the `/__rpc` prefix:
//! - `/__rpc/request/{server_id}` - requests for a named destination
//! - `/__rpc/request/agent/{server_id}` - inbound requests for an agent-mode
//!   connection addressing that destination
//! - `/__rpc/reply/{instance}` - private per-connection reply topic
//! - `/__rpc/result` - shared topic on which agents report results
//! - `/__rpc/listener/{name}` - broadcast topics derived from listener names

use thiserror::Error;
use uuid::Uuid;

const TOPIC_PREFIX: &str = "/__rpc";

/// Shared topic on which agent-mode connections report results
pub const RESULT_TOPIC: &str = "/__rpc/result";

pub fn canonicalize_topic(topic: &str) -> String {
    if topic.is_empty() {
        return "/".to_string();
    }

    // Single leading slash
    let mut result = if topic.starts_with('/') {
        topic.to_string()
    } else {
        format!("/{topic}")
    };

    // Collapse consecutive slashes
    while result.contains("//") {
        result = result.replace("//", "/");
    }

    // No trailing slash (except for root "/")
    if result.len() > 1 && result.ends_with('/') {
        result.pop();
    }

    result
}

pub fn validate_server_id(server_id: &str) -> Result<(), ValidationError> {
    if server_id.is_empty() {
        return Err(ValidationError::EmptyServerId);
    }

    for ch in server_id.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '.' && ch != '_' && ch != '-' {
            return Err(ValidationError::InvalidServerIdChar(ch));
        }
    }

    Ok(())
}

/// Validation errors for topic construction
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("server id cannot be empty")]
    EmptyServerId,
    #[error("server id contains invalid character: '{0}'")]
    InvalidServerIdChar(char),
}

/// Topic construction for the RPC wire contract
pub struct TopicBuilder;

impl TopicBuilder {
    /// Request topic scoped to a named destination: `/__rpc/request/{server_id}`
    pub fn request_topic(server_id: &str) -> String {
        canonicalize_topic(&format!("{TOPIC_PREFIX}/request/{server_id}"))
    }

    /// Agent-request topic: `/__rpc/request/agent/{server_id}`
    pub fn agent_request_topic(server_id: &str) -> String {
        canonicalize_topic(&format!("{TOPIC_PREFIX}/request/agent/{server_id}"))
    }

    /// Private reply topic for a connection instance: `/__rpc/reply/{instance}`
    pub fn reply_topic(instance_id: &str) -> String {
        canonicalize_topic(&format!("{TOPIC_PREFIX}/reply/{instance_id}"))
    }

    /// Broadcast topic derived from a logical listener name:
    /// `/__rpc/listener/{name}`
    pub fn listener_topic(name: &str) -> String {
        canonicalize_topic(&format!("{TOPIC_PREFIX}/listener/{name}"))
    }

    /// Generate a process-unique connection instance id for the reply topic
    pub fn new_instance_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn canonicalize_topic_is_idempotent(topic in ".*") {
            let first = canonicalize_topic(&topic);
            let second = canonicalize_topic(&first);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn canonicalize_topic_starts_with_single_slash(topic in ".*") {
            let result = canonicalize_topic(&topic);
            prop_assert!(result.starts_with('/'), "should start with /: {}", result);
            prop_assert!(!result.starts_with("//"), "should not start with //: {}", result);
        }

        #[test]
        fn canonicalize_topic_no_consecutive_slashes(topic in ".*") {
            let result = canonicalize_topic(&topic);
            prop_assert!(!result.contains("//"), "no consecutive slashes: {}", result);
        }

        #[test]
        fn valid_server_ids_pass(id in "[a-zA-Z0-9._-]{1,64}") {
            prop_assert!(validate_server_id(&id).is_ok());
        }
    }

    #[test]
    fn test_canonicalize_edge_cases() {
        assert_eq!(canonicalize_topic(""), "/");
        assert_eq!(canonicalize_topic("//"), "/");
        assert_eq!(canonicalize_topic("test"), "/test");
        assert_eq!(canonicalize_topic("/test/"), "/test");
        assert_eq!(canonicalize_topic("//a//b//c//"), "/a/b/c");
    }

    #[test]
    fn test_topic_builders() {
        assert_eq!(TopicBuilder::request_topic("grid-1"), "/__rpc/request/grid-1");
        assert_eq!(
            TopicBuilder::agent_request_topic("grid-1"),
            "/__rpc/request/agent/grid-1"
        );
        assert_eq!(TopicBuilder::reply_topic("abc123"), "/__rpc/reply/abc123");
        assert_eq!(
            TopicBuilder::listener_topic("price-feed"),
            "/__rpc/listener/price-feed"
        );
        assert_eq!(RESULT_TOPIC, "/__rpc/result");
    }

    #[test]
    fn test_listener_topics_are_case_sensitive() {
        // Name normalization is deliberate: names are used verbatim, so two
        // names differing only in case are two distinct topics.
        assert_ne!(
            TopicBuilder::listener_topic("Feed"),
            TopicBuilder::listener_topic("feed")
        );
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = TopicBuilder::new_instance_id();
        let b = TopicBuilder::new_instance_id();
        assert_ne!(a, b);
        assert_ne!(TopicBuilder::reply_topic(&a), TopicBuilder::reply_topic(&b));
    }

    #[test]
    fn test_server_id_validation() {
        assert!(validate_server_id("grid-1").is_ok());
        assert!(validate_server_id("a.b_c-d").is_ok());
        assert_eq!(validate_server_id(""), Err(ValidationError::EmptyServerId));
        assert_eq!(
            validate_server_id("grid/1"),
            Err(ValidationError::InvalidServerIdChar('/'))
        );
        assert!(validate_server_id("grid 1").is_err());
    }
}
