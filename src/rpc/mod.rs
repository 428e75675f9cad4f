//! Correlation and dispatch engine
//!
//! `RpcClient` owns one background dispatch loop fed by the transport. Every
//! inbound message takes exactly one of three routes: the agent dispatcher
//! (agent-request topic), the request correlator (reply topic), or the
//! listener registry (everything else).

pub mod agent;
pub mod client;
pub mod correlator;
pub mod invoker;
pub mod listeners;

pub use agent::RequestHandler;
pub use client::RpcClient;
pub use correlator::Correlator;
pub use invoker::RpcInvoker;
pub use listeners::{ListenerRegistry, RpcListener};
