use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tandem_json_rpc::RpcResult;
use tandem_transport::Transport;
use tracing::debug;

use crate::endpoint::RpcEndpoint;
use crate::shutdown::ShutdownToken;

/// Serving facade over an [`RpcEndpoint`].
///
/// Register handlers, then park on [`serve`](Self::serve) until someone
/// (typically a handler holding the [`ShutdownToken`]) asks the server to
/// stop:
///
/// ```no_run
/// # use tandem_endpoint::RpcServer;
/// # use tandem_transport::{Framed, PipeTransport};
/// # async fn run() -> tandem_json_rpc::RpcResult<()> {
/// let server = RpcServer::new(Framed::new(PipeTransport::server("/tmp/calc.sock")));
/// server.register_call("add", |_params| async move {
///     // ...
/// #   Ok(serde_json::Value::Null)
/// });
/// let stop = server.shutdown_token();
/// server.register_notification("stop", move |_params| {
///     let stop = stop.clone();
///     async move { stop.trigger() }
/// });
/// server.serve().await?;
/// # Ok(()) }
/// ```
pub struct RpcServer {
    endpoint: Arc<RpcEndpoint>,
}

impl RpcServer {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            endpoint: RpcEndpoint::new(transport),
        }
    }

    /// Register a method-call handler. Call before [`serve`](Self::serve).
    pub fn register_call<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Value>> + Send + 'static,
    {
        self.endpoint.register_call(method, handler);
    }

    /// Register a notification handler. Call before [`serve`](Self::serve).
    pub fn register_notification<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.endpoint.register_notification(method, handler);
    }

    /// Token that stops [`serve`](Self::serve) when triggered. Cloneable
    /// into handlers; this is how a "stop" method shuts the server down
    /// without a reference cycle.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.endpoint.shutdown_token()
    }

    /// Push a notification to the connected peer.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> RpcResult<()> {
        self.endpoint.send_notification(method, params).await
    }

    /// Start the endpoint and serve until shutdown is requested, then
    /// tear down.
    pub async fn serve(&self) -> RpcResult<()> {
        self.endpoint.start().await?;
        debug!("server endpoint serving");
        self.endpoint.shutdown_token().triggered().await;
        self.endpoint.shutdown().await
    }

    /// Request shutdown from outside [`serve`](Self::serve).
    pub async fn shutdown(&self) -> RpcResult<()> {
        self.endpoint.shutdown().await
    }

    pub fn is_running(&self) -> bool {
        self.endpoint.is_running()
    }

    /// The underlying endpoint, for callers that need the full surface
    /// (e.g. issuing calls back to the peer).
    pub fn endpoint(&self) -> &Arc<RpcEndpoint> {
        &self.endpoint
    }
}
