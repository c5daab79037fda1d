//! Common types and pure logic for the lt-tunnel reverse-tunnel client
//!
//! This crate provides the error taxonomy, the broker's registration data,
//! session events, the Host header rewriter and option validation used by the
//! client library and its tests.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod rewrite;
pub mod validation;

// Re-export commonly used types for convenience
pub use error::{Result, TunnelError};
pub use protocol::{BrokerEndpoint, RequestInfo, TunnelDescriptor, TunnelEvent};
pub use rewrite::HostRewriter;
