use std::fmt;

use serde_json::{json, Value};
use thiserror::Error;

/// Result alias used by every fallible operation in the library.
pub type RpcResult<T> = Result<T, RpcError>;

/// The closed set of error kinds with their stable numeric codes.
///
/// The first five are the JSON-RPC 2.0 standard codes; the rest are
/// implementation-defined extensions in the reserved server range.
/// `ClientError` and `TimeoutError` are local-only: they are surfaced to
/// the caller of `send_call` and never transmitted to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError,
    TimeoutError,
    TransportError,
    ClientError,
}

impl RpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            RpcErrorCode::ParseError => -32700,
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::InternalError => -32603,
            RpcErrorCode::ServerError => -32000,
            RpcErrorCode::TimeoutError => -32001,
            RpcErrorCode::TransportError => -32010,
            RpcErrorCode::ClientError => -32099,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            RpcErrorCode::ParseError => "Parse error",
            RpcErrorCode::InvalidRequest => "Invalid request",
            RpcErrorCode::MethodNotFound => "Method not found",
            RpcErrorCode::InvalidParams => "Invalid parameters",
            RpcErrorCode::InternalError => "Internal error",
            RpcErrorCode::ServerError => "Server error",
            RpcErrorCode::TimeoutError => "Timeout error",
            RpcErrorCode::TransportError => "Transport error",
            RpcErrorCode::ClientError => "Client error",
        }
    }

    /// Map a wire code back into the closed set.
    ///
    /// Codes in the implementation-defined server range that are not one
    /// of our extensions collapse to `ServerError`; anything else unknown
    /// yields `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(RpcErrorCode::ParseError),
            -32600 => Some(RpcErrorCode::InvalidRequest),
            -32601 => Some(RpcErrorCode::MethodNotFound),
            -32602 => Some(RpcErrorCode::InvalidParams),
            -32603 => Some(RpcErrorCode::InternalError),
            -32001 => Some(RpcErrorCode::TimeoutError),
            -32010 => Some(RpcErrorCode::TransportError),
            -32099 => Some(RpcErrorCode::ClientError),
            c if (-32099..=-32000).contains(&c) => Some(RpcErrorCode::ServerError),
            _ => None,
        }
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A JSON-RPC error: a kind from the closed set, a message, and an
/// optional data payload.
///
/// Equality compares `(code, message)` only; `data` is diagnostic
/// baggage and does not participate.
#[derive(Debug, Clone, Error)]
#[error("rpc error {code}: {message}")]
pub struct RpcError {
    code: RpcErrorCode,
    message: String,
    data: Option<Value>,
}

impl PartialEq for RpcError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.message == other.message
    }
}

impl Eq for RpcError {}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// An error carrying the default message for its code.
    pub fn from_code(code: RpcErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::TransportError, message)
    }

    pub fn client_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ClientError, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ServerError, message)
    }

    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::TimeoutError, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InternalError, message)
    }

    pub fn code(&self) -> RpcErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// The JSON-RPC error object form: `{code, message, data?}`.
    pub fn to_error_object(&self) -> Value {
        let mut obj = json!({
            "code": self.code.code(),
            "message": self.message,
        });
        if let Some(data) = &self.data {
            obj["data"] = data.clone();
        }
        obj
    }

    /// Parse a wire error object back into an `RpcError`.
    ///
    /// Requires an integer `code` and a string `message`. Codes outside
    /// the closed set collapse to `ServerError`.
    pub fn from_error_object(value: &Value) -> RpcResult<Self> {
        let code = value
            .get("code")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                RpcError::new(
                    RpcErrorCode::InvalidRequest,
                    "error object must carry an integer \"code\"",
                )
            })?;
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RpcError::new(
                    RpcErrorCode::InvalidRequest,
                    "error object must carry a string \"message\"",
                )
            })?;

        let kind = RpcErrorCode::from_code(code).unwrap_or(RpcErrorCode::ServerError);
        let mut error = RpcError::new(kind, message);
        if let Some(data) = value.get("data") {
            error = error.with_data(data.clone());
        }
        Ok(error)
    }
}
