use async_trait::async_trait;
use tandem_json_rpc::{RpcError, RpcResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::debug;

use crate::transport::{Transport, TransportState};

/// Newline-delimited transport over the process's standard handles.
///
/// Each `send` writes one message followed by `\n`; each `receive` yields
/// one line. Unframed: messages must not contain raw newlines, which
/// serialized JSON-RPC payloads never do. `close` only marks state;
/// the handles themselves stay with the process.
pub struct StdioTransport {
    state: TransportState,
    reader: Mutex<BufReader<Stdin>>,
    writer: Mutex<Stdout>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            state: TransportState::new(),
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
            writer: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&self) -> RpcResult<()> {
        self.state.check_can_start()?;
        self.state.mark_started();
        debug!("stdio transport started");
        Ok(())
    }

    async fn send(&self, payload: &[u8]) -> RpcResult<()> {
        self.state.check_open("send")?;

        let mut writer = self.writer.lock().await;
        writer
            .write_all(payload)
            .await
            .map_err(|e| RpcError::transport_error(format!("send failed: {e}")))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| RpcError::transport_error(format!("send failed: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| RpcError::transport_error(format!("flush failed: {e}")))?;
        Ok(())
    }

    async fn receive(&self) -> RpcResult<Vec<u8>> {
        self.state.check_open("receive")?;

        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| RpcError::transport_error(format!("receive failed: {e}")))?;

        if n == 0 {
            debug!("stdin reached EOF");
            self.state.mark_disconnected();
            return Err(RpcError::transport_error("connection closed"));
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line.into_bytes())
    }

    async fn close(&self) -> RpcResult<()> {
        if self.state.transition_closed() {
            debug!("stdio transport closed");
        }
        Ok(())
    }

    fn close_now(&self) {
        self.state.transition_closed();
    }
}
