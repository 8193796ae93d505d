use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tandem_json_rpc::{RpcError, RpcResult};
use tandem_transport::Transport;
use tracing::debug;

use crate::endpoint::RpcEndpoint;

/// Tunables for [`RpcClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Applied by [`RpcClient::call`] when set. `None` waits forever.
    pub default_call_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Caller-facing facade over an [`RpcEndpoint`].
///
/// Adds the per-call timeout layer the endpoint core deliberately leaves
/// out, and keeps the common client workflow to two calls:
///
/// ```no_run
/// # use tandem_endpoint::RpcClient;
/// # use tandem_transport::{Framed, PipeTransport};
/// # async fn run() -> tandem_json_rpc::RpcResult<()> {
/// let client = RpcClient::connect(Framed::new(PipeTransport::client("/tmp/calc.sock"))).await?;
/// let sum = client.call("add", Some(serde_json::json!({"a": 10, "b": 5}))).await?;
/// # Ok(()) }
/// ```
///
/// Because the underlying endpoint is bidirectional, the client can also
/// serve notifications pushed by the peer.
pub struct RpcClient {
    endpoint: Arc<RpcEndpoint>,
    config: ClientConfig,
}

impl RpcClient {
    /// Build and start a client over `transport` with default config.
    pub async fn connect(transport: impl Transport + 'static) -> RpcResult<Self> {
        Self::connect_with_config(transport, ClientConfig::default()).await
    }

    pub async fn connect_with_config(
        transport: impl Transport + 'static,
        config: ClientConfig,
    ) -> RpcResult<Self> {
        let endpoint = RpcEndpoint::new(transport);
        endpoint.start().await?;
        debug!("client endpoint initialized");
        Ok(Self { endpoint, config })
    }

    /// Call a method, honoring the configured default timeout.
    pub async fn call(&self, method: &str, params: Option<Value>) -> RpcResult<Value> {
        match self.config.default_call_timeout {
            Some(timeout) => self.call_with_timeout(method, params, timeout).await,
            None => self.endpoint.send_call(method, params).await,
        }
    }

    /// Call a method with an explicit deadline; elapsing maps to a
    /// `TimeoutError` (-32001). The endpoint's pending entry resolves
    /// quietly if the response still shows up later.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> RpcResult<Value> {
        match tokio::time::timeout(timeout, self.endpoint.send_call(method, params)).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::timeout_error(format!(
                "request timed out after {} ms: {method}",
                timeout.as_millis()
            ))),
        }
    }

    /// Fire a notification at the peer.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> RpcResult<()> {
        self.endpoint.send_notification(method, params).await
    }

    /// Handle notifications pushed by the peer.
    pub fn register_notification<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.endpoint.register_notification(method, handler);
    }

    pub fn has_pending_requests(&self) -> bool {
        self.endpoint.has_pending_requests()
    }

    pub fn pending_request_count(&self) -> usize {
        self.endpoint.pending_request_count()
    }

    pub async fn shutdown(&self) -> RpcResult<()> {
        self.endpoint.shutdown().await
    }

    /// The underlying endpoint, for callers that need the full surface.
    pub fn endpoint(&self) -> &Arc<RpcEndpoint> {
        &self.endpoint
    }
}
