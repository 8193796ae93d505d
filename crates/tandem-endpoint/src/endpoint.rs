use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tandem_json_rpc::{
    Request, RequestId, Response, RpcError, RpcErrorCode, RpcResult,
};
use tandem_transport::Transport;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::dispatcher::Dispatcher;
use crate::id::{IdGenerator, SequentialIdGenerator};
use crate::pending::PendingRequest;
use crate::shutdown::ShutdownToken;

/// Backoff applied after a failed receive before the pump tries again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A bidirectional JSON-RPC 2.0 peer bound to one transport.
///
/// One endpoint is simultaneously client and server: it issues method
/// calls and notifications, and serves the peer's calls and notifications,
/// over the same duplex stream. A single pump task owns the inbound
/// direction; outbound calls park in the pending table until the matching
/// response arrives.
///
/// The transport is exclusively owned: nothing else may touch it while
/// the endpoint runs. Handlers are expected to be registered before
/// [`start`](Self::start); later registration is tolerated but not part
/// of the contract.
pub struct RpcEndpoint {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    pending: Mutex<HashMap<i64, PendingRequest>>,
    id_generator: Box<dyn IdGenerator>,
    running: AtomicBool,
    shutdown_token: ShutdownToken,
    stopped: ShutdownToken,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl RpcEndpoint {
    pub fn new(transport: impl Transport + 'static) -> Arc<Self> {
        Self::with_id_generator(transport, Box::new(SequentialIdGenerator::new()))
    }

    pub fn with_id_generator(
        transport: impl Transport + 'static,
        id_generator: Box<dyn IdGenerator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport: Arc::new(transport),
            dispatcher: Dispatcher::new(),
            pending: Mutex::new(HashMap::new()),
            id_generator,
            running: AtomicBool::new(false),
            shutdown_token: ShutdownToken::new(),
            stopped: ShutdownToken::new(),
            pump: Mutex::new(None),
        })
    }

    /// Register a method-call handler. See [`Dispatcher::register_call`].
    pub fn register_call<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Value>> + Send + 'static,
    {
        self.dispatcher.register_call(method, handler);
    }

    /// Register a notification handler. See
    /// [`Dispatcher::register_notification`].
    pub fn register_notification<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.register_notification(method, handler);
    }

    /// A token observers and handlers can use to request shutdown without
    /// holding the endpoint itself.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.lock_pending().is_empty()
    }

    pub fn pending_request_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Start the transport and the message pump.
    ///
    /// Deliberately non-idempotent: a second call while running fails
    /// with a `ClientError`. Endpoints are not restartable after
    /// shutdown; the closed transport rejects the restart.
    pub async fn start(self: &Arc<Self>) -> RpcResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RpcError::client_error("RPC endpoint is already running"));
        }

        debug!("starting RPC endpoint");
        self.lock_pending().clear();

        if let Err(e) = self.transport.start().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let endpoint = Arc::clone(self);
        let handle = tokio::spawn(async move { endpoint.pump_messages().await });
        *self.pump.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Stop the pump, cancel every pending call, and close the transport.
    /// Idempotent.
    ///
    /// Must not be awaited from inside a handler: the pump is waiting on
    /// that handler's response and `shutdown` waits on the pump. Handlers
    /// request shutdown through [`Self::shutdown_token`] instead.
    pub async fn shutdown(&self) -> RpcResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        debug!("shutting down RPC endpoint");
        self.shutdown_token.trigger();

        let drained: Vec<(i64, PendingRequest)> =
            self.lock_pending().drain().collect();
        for (id, pending) in drained {
            debug!(id, "cancelling pending request");
            pending.cancel(
                RpcErrorCode::InternalError.code(),
                "RPC endpoint shutting down",
            );
        }

        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            if let Err(e) = pump.await {
                warn!(error = %e, "message pump ended abnormally");
            }
        }
        self.stopped.trigger();

        self.transport.close().await
    }

    /// Wait until the message pump has exited.
    pub async fn wait_for_shutdown(&self) {
        if !self.is_running() {
            return;
        }
        self.stopped.triggered().await;
    }

    /// Send a method call and wait for the peer's response.
    ///
    /// An error response resolves to a `ClientError` carrying the peer
    /// error's message, with the raw error object attached as data.
    pub async fn send_call(&self, method: &str, params: Option<Value>) -> RpcResult<Value> {
        if !self.is_running() {
            return Err(RpcError::client_error("RPC endpoint is not running"));
        }

        let id = self.id_generator.next_id();
        let request = Request::call(method, params, RequestId::Number(id));
        let payload = request.to_json().to_string();

        let (pending, slot) = PendingRequest::new();
        self.lock_pending().insert(id, pending);

        debug!(id, method, "sending method call");
        if let Err(e) = self.transport.send(payload.as_bytes()).await {
            self.lock_pending().remove(&id);
            return Err(e);
        }

        let response = slot.await_result().await?;
        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("peer returned an error");
            return Err(RpcError::client_error(message).with_data(error.clone()));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a notification: fire-and-forget, no pending entry, no
    /// response ever.
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> RpcResult<()> {
        if !self.is_running() {
            return Err(RpcError::client_error("RPC endpoint is not running"));
        }

        let request = Request::notification(method, params);
        debug!(method, "sending notification");
        self.transport
            .send(request.to_json().to_string().as_bytes())
            .await
    }

    /// The long-running message pump: one per endpoint, sole reader of
    /// the transport's inbound direction.
    async fn pump_messages(self: Arc<Self>) {
        debug!("message pump started");
        loop {
            if !self.is_running() || self.shutdown_token.is_triggered() {
                break;
            }

            let received = tokio::select! {
                _ = self.shutdown_token.triggered() => break,
                received = self.transport.receive() => received,
            };

            match received {
                Ok(raw) => {
                    if let Err(e) = self.handle_message(&raw).await {
                        error!(error = %e, "failed to handle message");
                        self.retry_delay().await;
                    }
                }
                Err(e) => {
                    if !self.is_running() || self.shutdown_token.is_triggered() {
                        break;
                    }
                    error!(error = %e, "receive error");
                    self.retry_delay().await;
                }
            }
        }
        self.stopped.trigger();
        debug!("message pump stopped");
    }

    async fn retry_delay(&self) {
        tokio::select! {
            _ = self.shutdown_token.triggered() => {}
            _ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => {}
        }
    }

    /// Classify one inbound message and route it.
    ///
    /// An object carrying `id` plus one of `result`/`error` is a response
    /// to one of our calls. Everything else, including unparseable text,
    /// goes to the dispatcher, which owns error-response synthesis.
    async fn handle_message(&self, raw: &[u8]) -> RpcResult<()> {
        let text = std::str::from_utf8(raw).map_err(|e| {
            RpcError::new(RpcErrorCode::ParseError, format!("message is not UTF-8: {e}"))
        })?;

        if let Ok(value) = serde_json::from_str::<Value>(text) {
            if is_response(&value) {
                self.handle_response(&value);
                return Ok(());
            }
        }

        if let Some(reply) = self.dispatcher.dispatch(text).await {
            self.transport.send(reply.as_bytes()).await?;
        }
        Ok(())
    }

    /// Resolve the pending call a response belongs to; log and drop
    /// anything that does not match exactly one armed entry.
    fn handle_response(&self, value: &Value) {
        let response = match Response::from_json(value) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "dropping invalid response");
                return;
            }
        };

        // The endpoint only issues integer ids, so anything else cannot
        // be ours.
        let id = match response.id().and_then(RequestId::as_i64) {
            Some(id) => id,
            None => {
                warn!("dropping response with missing or non-integer id");
                return;
            }
        };

        match self.lock_pending().remove(&id) {
            Some(pending) => {
                debug!(id, "resolving pending request");
                pending.resolve(response.to_json());
            }
            None => warn!(id, "unknown request id"),
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<i64, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_response(value: &Value) -> bool {
    value.is_object()
        && value.get("id").is_some()
        && (value.get("result").is_some() || value.get("error").is_some())
}
