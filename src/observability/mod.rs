//! Observability infrastructure
//!
//! Structured logging setup for library consumers and the demo binary.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
