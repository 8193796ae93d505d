use serde_json::{Map, Value};

use crate::error::{RpcError, RpcErrorCode, RpcResult};
use crate::types::RequestId;
use crate::JSONRPC_VERSION;

/// The mutually exclusive body of a response.
#[derive(Debug, Clone, PartialEq)]
enum ResponsePayload {
    /// The `result` member, any JSON value (including null).
    Result(Value),
    /// The `error` member, a `{code, message, data?}` object.
    Error(Value),
}

/// A single JSON-RPC response.
///
/// Exactly one of `result`/`error` is present. The id is absent (wire
/// `null`) only on error responses raised before the server could learn
/// the request id: parse errors and malformed requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    payload: ResponsePayload,
    id: Option<RequestId>,
}

impl Response {
    pub fn success(result: Value, id: Option<RequestId>) -> Self {
        Self {
            payload: ResponsePayload::Result(result),
            id,
        }
    }

    /// An error response carrying the default message for `code`.
    pub fn error(code: RpcErrorCode, id: Option<RequestId>) -> Self {
        Self::error_from(RpcError::from_code(code), id)
    }

    /// An error response built from a concrete [`RpcError`], preserving
    /// its code, message, and data.
    pub fn error_from(error: RpcError, id: Option<RequestId>) -> Self {
        Self {
            payload: ResponsePayload::Error(error.to_error_object()),
            id,
        }
    }

    /// An error response from a raw error object, for callers that
    /// construct the `{code, message, ...}` value themselves.
    pub fn error_custom(error: Value, id: Option<RequestId>) -> Self {
        Self {
            payload: ResponsePayload::Error(error),
            id,
        }
    }

    /// Parse and validate an inbound response object.
    pub fn from_json(value: &Value) -> RpcResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("response is not a JSON object"))?;

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(invalid("missing or invalid \"jsonrpc\" version"));
        }

        let result = obj.get("result");
        let error = obj.get("error");
        let payload = match (result, error) {
            (Some(result), None) => ResponsePayload::Result(result.clone()),
            (None, Some(error)) => {
                let code_ok = error.get("code").map(|c| c.as_i64().is_some());
                let message_ok = error.get("message").map(Value::is_string);
                if code_ok != Some(true) || message_ok != Some(true) {
                    return Err(invalid(
                        "error object must carry an integer \"code\" and a string \"message\"",
                    ));
                }
                ResponsePayload::Error(error.clone())
            }
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "response cannot carry both \"result\" and \"error\"",
                ))
            }
            (None, None) => {
                return Err(invalid(
                    "response must carry either \"result\" or \"error\"",
                ))
            }
        };

        let id = match obj.get("id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                RequestId::from_value(raw)
                    .ok_or_else(|| invalid("\"id\" must be an integer, a string, or null"))?,
            ),
        };

        if id.is_none() && matches!(payload, ResponsePayload::Result(_)) {
            return Err(invalid("success response must carry a non-null \"id\""));
        }

        Ok(Self { payload, id })
    }

    pub fn is_success(&self) -> bool {
        matches!(self.payload, ResponsePayload::Result(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Result(value) => Some(value),
            ResponsePayload::Error(_) => None,
        }
    }

    /// The raw `{code, message, data?}` object of an error response.
    pub fn error_object(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Result(_) => None,
            ResponsePayload::Error(value) => Some(value),
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    /// Serialize; error responses without an id emit an explicit
    /// `"id": null`.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), Value::from(JSONRPC_VERSION));
        match &self.payload {
            ResponsePayload::Result(result) => {
                obj.insert("result".into(), result.clone());
                if let Some(id) = &self.id {
                    obj.insert("id".into(), id.to_value());
                }
            }
            ResponsePayload::Error(error) => {
                obj.insert("error".into(), error.clone());
                obj.insert(
                    "id".into(),
                    self.id.as_ref().map(RequestId::to_value).unwrap_or(Value::Null),
                );
            }
        }
        Value::Object(obj)
    }
}

fn invalid(message: &str) -> RpcError {
    RpcError::new(RpcErrorCode::InvalidRequest, message)
}
