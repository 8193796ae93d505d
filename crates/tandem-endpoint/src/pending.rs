use serde_json::{json, Value};
use tandem_json_rpc::{RpcError, RpcResult};
use tokio::sync::oneshot;

/// The producer half of one outstanding method call: a set-once slot the
/// endpoint resolves when the peer's response arrives (or cancels on
/// shutdown).
///
/// Set-once is structural: both `resolve` and `cancel` consume the slot.
#[derive(Debug)]
pub struct PendingRequest {
    tx: oneshot::Sender<Value>,
}

/// The consumer half: awaited exactly once by the `send_call` that created
/// the pending request.
#[derive(Debug)]
pub struct ResultSlot {
    rx: oneshot::Receiver<Value>,
}

impl PendingRequest {
    pub fn new() -> (Self, ResultSlot) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, ResultSlot { rx })
    }

    /// Deliver the full response JSON. Silently dropped if the consumer
    /// gave up waiting (e.g. a caller-side timeout).
    pub fn resolve(self, response: Value) {
        let _ = self.tx.send(response);
    }

    /// Resolve with a synthetic error payload, as on endpoint shutdown.
    pub fn cancel(self, code: i64, message: &str) {
        self.resolve(json!({
            "error": {"code": code, "message": message}
        }));
    }
}

impl ResultSlot {
    /// Wait for the response JSON.
    ///
    /// A dropped producer (the endpoint discarded its pending table
    /// without cancelling) reads as shutdown.
    pub async fn await_result(self) -> RpcResult<Value> {
        self.rx
            .await
            .map_err(|_| RpcError::client_error("RPC endpoint shutting down"))
    }
}
