use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tandem_json_rpc::{RpcError, RpcResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::transport::{Transport, TransportState};

const READ_CHUNK_SIZE: usize = 4096;

/// Duplex transport over a Unix-domain socket.
///
/// A server-role instance removes a stale socket file, binds, and accepts
/// exactly one peer inside `start`; a client-role instance connects.
/// `receive` yields raw chunks; wrap in [`crate::Framed`] for message
/// boundaries. The server unlinks its socket file on close and on drop.
pub struct PipeTransport {
    path: PathBuf,
    is_server: bool,
    state: TransportState,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl PipeTransport {
    pub fn server(path: impl AsRef<Path>) -> Self {
        Self::new(path, true)
    }

    pub fn client(path: impl AsRef<Path>) -> Self {
        Self::new(path, false)
    }

    fn new(path: impl AsRef<Path>, is_server: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            is_server,
            state: TransportState::new(),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove_socket_file(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed socket file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove socket file"),
        }
    }

    async fn connect_stream(&self) -> RpcResult<UnixStream> {
        if self.is_server {
            self.remove_socket_file();
            let listener = UnixListener::bind(&self.path).map_err(|e| {
                RpcError::transport_error(format!(
                    "failed to bind {}: {e}",
                    self.path.display()
                ))
            })?;
            debug!(path = %self.path.display(), "pipe server waiting for connection");
            let (stream, _) = listener.accept().await.map_err(|e| {
                RpcError::transport_error(format!("failed to accept connection: {e}"))
            })?;
            debug!(path = %self.path.display(), "pipe server accepted connection");
            Ok(stream)
        } else {
            debug!(path = %self.path.display(), "pipe client connecting");
            UnixStream::connect(&self.path).await.map_err(|e| {
                RpcError::transport_error(format!(
                    "failed to connect to {}: {e}",
                    self.path.display()
                ))
            })
        }
    }
}

#[async_trait]
impl Transport for PipeTransport {
    async fn start(&self) -> RpcResult<()> {
        self.state.check_can_start()?;

        let stream = self.connect_stream().await?;
        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);

        self.state.mark_started();
        debug!(path = %self.path.display(), server = self.is_server, "pipe transport started");
        Ok(())
    }

    async fn send(&self, payload: &[u8]) -> RpcResult<()> {
        self.state.check_open("send")?;

        // Holding the write-half lock across the whole write keeps
        // concurrent sends from interleaving on the wire.
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| RpcError::transport_error("socket not open"))?;

        writer
            .write_all(payload)
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

        let mut guard = self.reader.lock().await;
        let reader = guard
            .as_mut()
            .ok_or_else(|| RpcError::transport_error("socket not open"))?;

        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| RpcError::transport_error(format!("receive failed: {e}")))?;

        if n == 0 {
            debug!(path = %self.path.display(), "peer closed connection");
            self.state.mark_disconnected();
            return Err(RpcError::transport_error("connection closed"));
        }

        chunk.truncate(n);
        Ok(chunk)
    }

    async fn close(&self) -> RpcResult<()> {
        if !self.state.transition_closed() {
            return Ok(());
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                warn!(error = %e, "error shutting down pipe writer");
            }
        }
        self.reader.lock().await.take();

        if self.is_server {
            self.remove_socket_file();
        }
        debug!(path = %self.path.display(), "pipe transport closed");
        Ok(())
    }

    fn close_now(&self) {
        if !self.state.transition_closed() {
            return;
        }

        // Dropping the halves closes the descriptor synchronously; skip
        // any half currently locked by an in-flight operation.
        if let Ok(mut guard) = self.writer.try_lock() {
            guard.take();
        }
        if let Ok(mut guard) = self.reader.try_lock() {
            guard.take();
        }
        if self.is_server {
            self.remove_socket_file();
        }
    }
}

impl Drop for PipeTransport {
    fn drop(&mut self) {
        self.close_now();
    }
}
