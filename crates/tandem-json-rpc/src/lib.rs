//! # JSON-RPC 2.0 message model
//!
//! The wire-level value objects shared by every other `tandem` crate:
//! [`Request`], [`Response`], [`RequestId`], and the [`RpcError`] /
//! [`RpcErrorCode`] error model. Nothing in this crate performs I/O; it
//! parses, validates, and serializes individual JSON-RPC 2.0 messages.
//!
//! Requests and responses are immutable after construction. Parsing is
//! strict: a message that does not satisfy the JSON-RPC 2.0 grammar is
//! rejected with an [`RpcError`] naming the violation, never silently
//! repaired.

pub mod error;
pub mod request;
pub mod response;
pub mod types;

pub use error::{RpcError, RpcErrorCode, RpcResult};
pub use request::Request;
pub use response::Response;
pub use types::RequestId;

/// JSON-RPC protocol version literal required in every message.
pub const JSONRPC_VERSION: &str = "2.0";
