//! Wire documents and topic conventions for RPC over MQTT

pub mod messages;
pub mod topics;

pub use messages::{RpcReply, RpcRequest};
pub use topics::{
    canonicalize_topic, validate_server_id, TopicBuilder, ValidationError, RESULT_TOPIC,
};
