use serde_json::{Map, Value};

use crate::error::{RpcError, RpcErrorCode, RpcResult};
use crate::types::RequestId;
use crate::JSONRPC_VERSION;

/// A single JSON-RPC request or notification.
///
/// Immutable once built. A request without an id is a notification and
/// never receives a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    params: Option<Value>,
    id: Option<RequestId>,
}

impl Request {
    /// Build an outbound notification (no id, no response expected).
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }

    /// Build an outbound method call carrying `id`.
    pub fn call(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// Parse and validate an inbound request object.
    ///
    /// Violations of the JSON-RPC 2.0 request grammar are reported as
    /// `InvalidRequest` errors naming the offending member.
    pub fn from_json(value: &Value) -> RpcResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            invalid_request("request is not a JSON object")
        })?;

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(invalid_request("missing or invalid \"jsonrpc\" version"));
        }

        let method = match obj.get("method").and_then(Value::as_str) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => return Err(invalid_request("\"method\" must be a non-empty string")),
        };

        let params = match obj.get("params") {
            None => None,
            Some(p) if p.is_object() || p.is_array() || p.is_null() => Some(p.clone()),
            Some(_) => {
                return Err(invalid_request(
                    "\"params\" must be an object, an array, or null",
                ))
            }
        };

        let id = match obj.get("id") {
            None => None,
            Some(raw) => Some(RequestId::from_value(raw).ok_or_else(|| {
                invalid_request("\"id\" must be an integer or a string")
            })?),
        };

        Ok(Self { method, params, id })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    pub fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn requires_response(&self) -> bool {
        self.id.is_some()
    }

    /// Serialize, emitting only the members that are present: no `id` for
    /// notifications, no `params` when there are none.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), Value::from(JSONRPC_VERSION));
        obj.insert("method".into(), Value::from(self.method.clone()));
        if let Some(params) = &self.params {
            obj.insert("params".into(), params.clone());
        }
        if let Some(id) = &self.id {
            obj.insert("id".into(), id.to_value());
        }
        Value::Object(obj)
    }
}

fn invalid_request(message: &str) -> RpcError {
    RpcError::new(RpcErrorCode::InvalidRequest, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_call() {
        let request = Request::from_json(&json!({
            "jsonrpc": "2.0",
            "method": "add",
            "params": {"a": 10, "b": 5},
            "id": 0
        }))
        .unwrap();

        assert_eq!(request.method(), "add");
        assert_eq!(request.params(), Some(&json!({"a": 10, "b": 5})));
        assert_eq!(request.id(), Some(&RequestId::Number(0)));
        assert!(request.requires_response());
    }

    #[test]
    fn test_parse_notification() {
        let request = Request::from_json(&json!({
            "jsonrpc": "2.0",
            "method": "notify",
            "params": [7]
        }))
        .unwrap();

        assert!(request.is_notification());
        assert_eq!(request.id(), None);
    }

    #[test]
    fn test_string_id_roundtrips() {
        let input = json!({"jsonrpc": "2.0", "method": "sum", "params": [1, 2], "id": "1"});
        let request = Request::from_json(&input).unwrap();
        assert_eq!(request.id(), Some(&RequestId::String("1".into())));
        assert_eq!(request.to_json(), input);
    }

    #[test]
    fn test_rejects_missing_version() {
        let err = Request::from_json(&json!({"method": "test"})).unwrap_err();
        assert_eq!(err.code(), RpcErrorCode::InvalidRequest);
        assert!(err.message().contains("jsonrpc"));
    }

    #[test]
    fn test_rejects_wrong_version() {
        let err =
            Request::from_json(&json!({"jsonrpc": "1.0", "method": "test"})).unwrap_err();
        assert_eq!(err.code(), RpcErrorCode::InvalidRequest);
    }

    #[test]
    fn test_rejects_bad_method() {
        for bad in [json!({"jsonrpc": "2.0"}),
                    json!({"jsonrpc": "2.0", "method": 5}),
                    json!({"jsonrpc": "2.0", "method": ""})] {
            let err = Request::from_json(&bad).unwrap_err();
            assert_eq!(err.code(), RpcErrorCode::InvalidRequest);
            assert!(err.message().contains("method"));
        }
    }

    #[test]
    fn test_rejects_scalar_params() {
        let err = Request::from_json(
            &json!({"jsonrpc": "2.0", "method": "m", "params": 3}),
        )
        .unwrap_err();
        assert!(err.message().contains("params"));
    }

    #[test]
    fn test_null_params_allowed() {
        let request = Request::from_json(
            &json!({"jsonrpc": "2.0", "method": "m", "params": null, "id": 1}),
        )
        .unwrap();
        assert_eq!(request.params(), Some(&json!(null)));
    }

    #[test]
    fn test_rejects_bad_id() {
        for bad_id in [json!(null), json!(1.5), json!([1]), json!(true)] {
            let err = Request::from_json(
                &json!({"jsonrpc": "2.0", "method": "m", "id": bad_id}),
            )
            .unwrap_err();
            assert!(err.message().contains("id"));
        }
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(Request::from_json(&json!([1, 2])).is_err());
        assert!(Request::from_json(&json!("call")).is_err());
    }

    #[test]
    fn test_notification_serialization_omits_id() {
        let request = Request::notification("ping", None);
        let value = request.to_json();
        assert_eq!(value, json!({"jsonrpc": "2.0", "method": "ping"}));
        assert!(value.get("id").is_none());
        assert!(value.get("params").is_none());
    }

    #[test]
    fn test_call_serialization() {
        let request = Request::call("add", Some(json!([1, 2])), RequestId::Number(9));
        assert_eq!(
            request.to_json(),
            json!({"jsonrpc": "2.0", "method": "add", "params": [1, 2], "id": 9})
        );
    }
}
