use async_trait::async_trait;
use tandem_json_rpc::{RpcError, RpcResult};
use tokio::sync::Mutex;
use tracing::error;

use crate::framer::{DeframeOutcome, MessageFramer};
use crate::pipe::PipeTransport;
use crate::tcp::TcpTransport;
use crate::transport::Transport;

/// Framing wrapper: applies LSP-style `Content-Length` framing to any
/// inner transport whose `receive` yields raw chunks.
///
/// `send` frames each payload before handing it to the inner transport;
/// `receive` accumulates inner chunks until the deframer emits one
/// complete message. A fatal framing error closes the inner transport.
pub struct Framed<T> {
    inner: T,
    deframe: Mutex<DeframeState>,
}

struct DeframeState {
    framer: MessageFramer,
    buffer: Vec<u8>,
}

/// `Content-Length`-framed Unix-domain socket transport.
pub type FramedPipeTransport = Framed<PipeTransport>;

/// `Content-Length`-framed TCP transport.
pub type FramedTcpTransport = Framed<TcpTransport>;

impl<T> Framed<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            deframe: Mutex::new(DeframeState {
                framer: MessageFramer::new(),
                buffer: Vec::new(),
            }),
        }
    }

    /// Access the wrapped transport (e.g. a TCP adapter's local address).
    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for Framed<T> {
    async fn start(&self) -> RpcResult<()> {
        self.inner.start().await
    }

    async fn send(&self, payload: &[u8]) -> RpcResult<()> {
        self.inner.send(&MessageFramer::frame(payload)).await
    }

    async fn receive(&self) -> RpcResult<Vec<u8>> {
        let mut state = self.deframe.lock().await;
        loop {
            let DeframeState { framer, buffer } = &mut *state;
            match framer.try_deframe(buffer) {
                DeframeOutcome::Message { payload, consumed } => {
                    buffer.drain(..consumed);
                    return Ok(payload);
                }
                DeframeOutcome::Fatal(reason) => {
                    error!(%reason, "framing error, closing transport");
                    self.inner.close_now();
                    return Err(RpcError::transport_error(format!(
                        "framing error: {reason}"
                    )));
                }
                DeframeOutcome::NeedMore => {}
            }

            let chunk = self.inner.receive().await?;
            state.buffer.extend_from_slice(&chunk);
        }
    }

    async fn close(&self) -> RpcResult<()> {
        self.inner.close().await
    }

    fn close_now(&self) {
        self.inner.close_now();
    }
}
