//! In-memory paired transport for endpoint tests: two halves joined by
//! channels, one message per `send`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tandem_json_rpc::{RpcError, RpcResult};
use tandem_transport::Transport;
use tokio::sync::{mpsc, Mutex};

pub struct PairTransport {
    started: AtomicBool,
    closed: AtomicBool,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

/// Two connected transports; whatever one sends, the other receives.
pub fn pair() -> (PairTransport, PairTransport) {
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();
    (
        PairTransport::new(left_tx, right_rx),
        PairTransport::new(right_tx, left_rx),
    )
}

impl PairTransport {
    fn new(tx: mpsc::UnboundedSender<Vec<u8>>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }
}

#[async_trait]
impl Transport for PairTransport {
    async fn start(&self) -> RpcResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::transport_error("cannot start a closed transport"));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RpcError::transport_error("transport already started"));
        }
        Ok(())
    }

    async fn send(&self, payload: &[u8]) -> RpcResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::transport_error("send on closed transport"));
        }
        let guard = self.tx.lock().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| RpcError::transport_error("send on closed transport"))?;
        tx.send(payload.to_vec())
            .map_err(|_| RpcError::transport_error("connection closed"))
    }

    async fn receive(&self) -> RpcResult<Vec<u8>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::transport_error("receive on closed transport"));
        }
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| RpcError::transport_error("connection closed"))
    }

    async fn close(&self) -> RpcResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.tx.lock().await.take();
        Ok(())
    }

    fn close_now(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.tx.try_lock() {
            guard.take();
        }
    }
}
