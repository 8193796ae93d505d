use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use tandem_json_rpc::{Request, RequestId, Response, RpcError, RpcErrorCode, RpcResult};
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Stored form of a method-call handler: JSON params in, JSON result (or
/// a typed error) out.
pub type MethodHandler =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, RpcResult<Value>> + Send + Sync>;

/// Stored form of a notification handler: fire-and-forget.
pub type NotificationHandler = Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Routes inbound requests and notifications to registered handlers and
/// assembles the responses, honoring JSON-RPC 2.0 batch rules.
///
/// Handler tables are populated before the endpoint starts; registration
/// afterwards is lock-protected but not expected. Re-registering a method
/// overwrites the previous handler. The same name must not be registered
/// as both a call and a notification.
///
/// Call handlers execute on the tokio runtime via `tokio::spawn`, so the
/// members of a batch run concurrently and a panicking handler poisons
/// only its own response, not the dispatcher.
#[derive(Default)]
pub struct Dispatcher {
    method_handlers: RwLock<HashMap<String, MethodHandler>>,
    notification_handlers: RwLock<HashMap<String, NotificationHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) a method-call handler.
    pub fn register_call<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Value>> + Send + 'static,
    {
        let method = method.into();
        debug!(method = %method, "registering method call handler");
        let handler: MethodHandler = Arc::new(move |params| Box::pin(handler(params)));
        self.method_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method, handler);
    }

    /// Register (or overwrite) a notification handler.
    pub fn register_notification<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let method = method.into();
        debug!(method = %method, "registering notification handler");
        let handler: NotificationHandler = Arc::new(move |params| Box::pin(handler(params)));
        self.notification_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method, handler);
    }

    /// Names of the registered call methods.
    pub fn method_names(&self) -> Vec<String> {
        self.method_handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Sole entry point from the endpoint's pump: parse a raw message,
    /// route it, and return the serialized response text, if any.
    ///
    /// Every failure mode is encoded as an error *response*; notifications
    /// (and all-notification batches) yield `None`.
    pub async fn dispatch(&self, raw: &str) -> Option<String> {
        let root: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "message is not valid JSON");
                return Some(
                    Response::error(RpcErrorCode::ParseError, None)
                        .to_json()
                        .to_string(),
                );
            }
        };

        match &root {
            Value::Object(_) => self
                .dispatch_element(&root)
                .await
                .map(|response| response.to_json().to_string()),
            Value::Array(elements) => {
                if elements.is_empty() {
                    return Some(
                        Response::error(RpcErrorCode::InvalidRequest, None)
                            .to_json()
                            .to_string(),
                    );
                }

                let pending = elements.iter().map(|element| self.dispatch_element(element));
                let responses: Vec<Value> = join_all(pending)
                    .await
                    .into_iter()
                    .flatten()
                    .map(|response| response.to_json())
                    .collect();

                if responses.is_empty() {
                    None
                } else {
                    Some(Value::Array(responses).to_string())
                }
            }
            _ => Some(
                Response::error(RpcErrorCode::InvalidRequest, None)
                    .to_json()
                    .to_string(),
            ),
        }
    }

    /// Validate one element, then run it under single-request rules.
    async fn dispatch_element(&self, element: &Value) -> Option<Response> {
        match Request::from_json(element) {
            Ok(request) => self.dispatch_single(request).await,
            Err(error) => {
                // Best-effort id: echo it back if the element carried a
                // well-formed one.
                let id = element.get("id").and_then(RequestId::from_value);
                Some(Response::error_from(error, id))
            }
        }
    }

    async fn dispatch_single(&self, request: Request) -> Option<Response> {
        let method = request.method().to_string();
        let params = request.params().cloned();

        if request.is_notification() {
            let handler = self
                .notification_handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&method)
                .cloned();
            match handler {
                Some(handler) => {
                    debug!(method = %method, "spawning notification handler");
                    tokio::spawn(handler(params));
                }
                None => debug!(method = %method, "no handler for notification"),
            }
            return None;
        }

        let id = request.id().cloned();
        let handler = self
            .method_handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&method)
            .cloned();
        let Some(handler) = handler else {
            debug!(method = %method, "method not found");
            return Some(Response::error(RpcErrorCode::MethodNotFound, id));
        };

        match tokio::spawn(handler(params)).await {
            Ok(Ok(result)) => Some(Response::success(result, id)),
            Ok(Err(error)) => {
                debug!(method = %method, %error, "handler returned an error");
                Some(Response::error_from(error, id))
            }
            Err(join_error) => {
                let reason = fault_reason(join_error);
                warn!(method = %method, reason = %reason, "handler failed");
                Some(Response::error_from(
                    RpcError::from_code(RpcErrorCode::InternalError)
                        .with_data(Value::from(reason)),
                    id,
                ))
            }
        }
    }
}

/// Human-readable cause of a handler task failure.
fn fault_reason(error: JoinError) -> String {
    if error.is_panic() {
        let panic = error.into_panic();
        if let Some(message) = panic.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = panic.downcast_ref::<String>() {
            message.clone()
        } else {
            "handler panicked".to_string()
        }
    } else {
        "handler task was cancelled".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    fn sum_dispatcher() -> Dispatcher {
        let dispatcher = Dispatcher::new();
        dispatcher.register_call("sum", |params| async move {
            let total: i64 = params
                .and_then(|p| p.as_array().cloned())
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_i64)
                .sum();
            Ok(json!(total))
        });
        dispatcher
    }

    async fn dispatch_value(dispatcher: &Dispatcher, raw: &str) -> Value {
        let text = dispatcher.dispatch(raw).await.expect("expected a response");
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_method_call() {
        let dispatcher = sum_dispatcher();
        let response = dispatch_value(
            &dispatcher,
            r#"{"jsonrpc":"2.0","method":"sum","params":[1,2,3],"id":1}"#,
        )
        .await;
        assert_eq!(response["result"], 6);
        assert_eq!(response["id"], 1);
    }

    #[tokio::test]
    async fn test_method_not_found() {
        let dispatcher = Dispatcher::new();
        let response = dispatch_value(
            &dispatcher,
            r#"{"jsonrpc":"2.0","method":"unknown","id":1}"#,
        )
        .await;
        assert_eq!(response["error"]["code"], -32601);
        assert_eq!(response["id"], 1);
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let dispatcher = Dispatcher::new();
        let response = dispatch_value(&dispatcher, r#"{"method":"test"}"#).await;
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(response["id"], json!(null));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let dispatcher = Dispatcher::new();
        let response = dispatch_value(&dispatcher, "not json at all").await;
        assert_eq!(response["error"]["code"], -32700);
        assert_eq!(response["id"], json!(null));
    }

    #[tokio::test]
    async fn test_scalar_message_is_invalid_request() {
        let dispatcher = Dispatcher::new();
        let response = dispatch_value(&dispatcher, "42").await;
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_handler_error_preserves_code_and_message() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_call("divide", |params| async move {
            let p = params.unwrap_or_else(|| json!({}));
            let a = p["a"].as_f64().unwrap_or(0.0);
            let b = p["b"].as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err(RpcError::server_error("Division by zero"));
            }
            Ok(json!({"result": a / b}))
        });

        let response = dispatch_value(
            &dispatcher,
            r#"{"jsonrpc":"2.0","method":"divide","params":{"a":10,"b":0},"id":2}"#,
        )
        .await;
        assert_eq!(response["error"]["code"], -32000);
        assert_eq!(response["error"]["message"], "Division by zero");
        assert_eq!(response["id"], 2);
    }

    #[tokio::test]
    async fn test_handler_panic_maps_to_internal_error() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_call("fail", |_params| async move {
            panic!("intentional failure")
        });

        let response = dispatch_value(
            &dispatcher,
            r#"{"jsonrpc":"2.0","method":"fail","id":1}"#,
        )
        .await;
        assert_eq!(response["error"]["code"], -32603);
        assert_eq!(response["error"]["data"], "intentional failure");
        assert_eq!(response["id"], 1);
    }

    #[tokio::test]
    async fn test_handler_null_result() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_call("void", |_params| async move { Ok(json!(null)) });
        let response = dispatch_value(
            &dispatcher,
            r#"{"jsonrpc":"2.0","method":"void","id":7}"#,
        )
        .await;
        assert_eq!(response["result"], json!(null));
        assert_eq!(response["id"], 7);
    }

    #[tokio::test]
    async fn test_notification_returns_nothing() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        {
            let received = Arc::clone(&received);
            dispatcher.register_notification("notify", move |params| {
                let received = Arc::clone(&received);
                async move {
                    received.lock().unwrap().push(params);
                }
            });
        }

        let outcome = dispatcher
            .dispatch(r#"{"jsonrpc":"2.0","method":"notify","params":[7]}"#)
            .await;
        assert!(outcome.is_none());

        // The handler runs detached; give it a beat.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let seen = received.lock().unwrap();
        assert_eq!(seen.as_slice(), &[Some(json!([7]))]);
    }

    #[tokio::test]
    async fn test_unknown_notification_is_dropped() {
        let dispatcher = Dispatcher::new();
        let outcome = dispatcher
            .dispatch(r#"{"jsonrpc":"2.0","method":"nobody-listens"}"#)
            .await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_batch_mixed_calls_and_notification() {
        let dispatcher = sum_dispatcher();
        dispatcher.register_notification("notify", |_params| async {});

        let response = dispatch_value(
            &dispatcher,
            r#"[
                {"jsonrpc":"2.0","method":"sum","params":[1,2],"id":"1"},
                {"jsonrpc":"2.0","method":"notify","params":[7]},
                {"jsonrpc":"2.0","method":"sum","params":[3,4],"id":"2"}
            ]"#,
        )
        .await;

        let members = response.as_array().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0]["result"], 3);
        assert_eq!(members[0]["id"], "1");
        assert_eq!(members[1]["result"], 7);
        assert_eq!(members[1]["id"], "2");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dispatcher = Dispatcher::new();
        let response = dispatch_value(&dispatcher, "[]").await;
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(response["id"], json!(null));
    }

    #[tokio::test]
    async fn test_batch_with_malformed_element() {
        let dispatcher = Dispatcher::new();
        let response = dispatch_value(&dispatcher, "[1]").await;
        let members = response.as_array().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_batch_of_notifications_returns_nothing() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_notification("tick", |_params| async {});
        let outcome = dispatcher
            .dispatch(
                r#"[{"jsonrpc":"2.0","method":"tick"},{"jsonrpc":"2.0","method":"tick"}]"#,
            )
            .await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_batch_keeps_best_effort_id_for_malformed_element() {
        let dispatcher = sum_dispatcher();
        let response = dispatch_value(
            &dispatcher,
            r#"[
                {"jsonrpc":"2.0","method":"sum","params":[2,2],"id":1},
                {"jsonrpc":"1.0","method":"sum","id":2}
            ]"#,
        )
        .await;

        let members = response.as_array().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0]["result"], 4);
        assert_eq!(members[1]["error"]["code"], -32600);
        assert_eq!(members[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_batch_members_run_concurrently() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_call("slow", |_params| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(json!("done"))
        });

        let batch = r#"[
            {"jsonrpc":"2.0","method":"slow","id":1},
            {"jsonrpc":"2.0","method":"slow","id":2},
            {"jsonrpc":"2.0","method":"slow","id":3},
            {"jsonrpc":"2.0","method":"slow","id":4}
        ]"#;

        let started = std::time::Instant::now();
        let response = dispatch_value(&dispatcher, batch).await;
        let elapsed = started.elapsed();

        assert_eq!(response.as_array().unwrap().len(), 4);
        // Serial execution would need ~200ms.
        assert!(
            elapsed < Duration::from_millis(150),
            "batch took {elapsed:?}, members did not overlap"
        );
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_call("m", |_params| async { Ok(json!("first")) });
        dispatcher.register_call("m", |_params| async { Ok(json!("second")) });

        let response =
            dispatch_value(&dispatcher, r#"{"jsonrpc":"2.0","method":"m","id":1}"#).await;
        assert_eq!(response["result"], "second");
        assert_eq!(dispatcher.method_names(), vec!["m".to_string()]);
    }
}
