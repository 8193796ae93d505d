use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tandem_json_rpc::{RpcError, RpcResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::transport::{Transport, TransportState};

const READ_CHUNK_SIZE: usize = 4096;

enum TcpRole {
    Client,
    Server,
    /// Server over a listener the caller bound in advance (ephemeral
    /// ports, embedders that manage their own sockets).
    ServerWithListener(Mutex<Option<TcpListener>>),
}

/// Duplex transport over a TCP connection.
///
/// A server-role instance binds with `SO_REUSEADDR` and accepts exactly
/// one peer inside `start`; a client-role instance connects. `receive`
/// yields raw chunks; wrap in [`crate::Framed`] for message boundaries.
pub struct TcpTransport {
    host: String,
    port: u16,
    role: TcpRole,
    state: TransportState,
    local_addr: StdMutex<Option<SocketAddr>>,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl TcpTransport {
    pub fn server(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, TcpRole::Server)
    }

    pub fn client(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, TcpRole::Client)
    }

    /// Server over a pre-bound listener; `start` skips bind and only
    /// accepts. The listener's address is available from `local_addr`
    /// immediately.
    pub fn with_listener(listener: TcpListener) -> Self {
        let local_addr = listener.local_addr().ok();
        Self {
            host: local_addr.map(|a| a.ip().to_string()).unwrap_or_default(),
            port: local_addr.map(|a| a.port()).unwrap_or_default(),
            role: TcpRole::ServerWithListener(Mutex::new(Some(listener))),
            state: TransportState::new(),
            local_addr: StdMutex::new(local_addr),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    fn new(host: impl Into<String>, port: u16, role: TcpRole) -> Self {
        Self {
            host: host.into(),
            port,
            role,
            state: TransportState::new(),
            local_addr: StdMutex::new(None),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    /// The locally bound address, once known (after `start` for
    /// `server`, immediately for `with_listener`).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn resolve(&self) -> RpcResult<SocketAddr> {
        lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                RpcError::transport_error(format!(
                    "failed to resolve {}:{}: {e}",
                    self.host, self.port
                ))
            })?
            .next()
            .ok_or_else(|| {
                RpcError::transport_error(format!(
                    "no addresses for {}:{}",
                    self.host, self.port
                ))
            })
    }

    async fn bind_listener(&self) -> RpcResult<TcpListener> {
        let addr = self.resolve().await?;
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| RpcError::transport_error(format!("failed to create socket: {e}")))?;

        socket
            .set_reuseaddr(true)
            .map_err(|e| RpcError::transport_error(format!("failed to set SO_REUSEADDR: {e}")))?;
        socket
            .bind(addr)
            .map_err(|e| RpcError::transport_error(format!("failed to bind {addr}: {e}")))?;
        socket
            .listen(1024)
            .map_err(|e| RpcError::transport_error(format!("failed to listen on {addr}: {e}")))
    }

    async fn connect_stream(&self) -> RpcResult<TcpStream> {
        match &self.role {
            TcpRole::Client => {
                debug!(host = %self.host, port = self.port, "tcp client connecting");
                TcpStream::connect((self.host.as_str(), self.port))
                    .await
                    .map_err(|e| {
                        RpcError::transport_error(format!(
                            "failed to connect to {}:{}: {e}",
                            self.host, self.port
                        ))
                    })
            }
            TcpRole::Server => {
                let listener = self.bind_listener().await?;
                self.accept_one(listener).await
            }
            TcpRole::ServerWithListener(slot) => {
                let listener = slot.lock().await.take().ok_or_else(|| {
                    RpcError::transport_error("listener already consumed")
                })?;
                self.accept_one(listener).await
            }
        }
    }

    async fn accept_one(&self, listener: TcpListener) -> RpcResult<TcpStream> {
        if let Ok(addr) = listener.local_addr() {
            *self.local_addr.lock().unwrap_or_else(|e| e.into_inner()) = Some(addr);
        }
        debug!(addr = ?listener.local_addr().ok(), "tcp server waiting for connection");
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| RpcError::transport_error(format!("failed to accept connection: {e}")))?;
        debug!(%peer, "tcp server accepted connection");
        Ok(stream)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn start(&self) -> RpcResult<()> {
        self.state.check_can_start()?;

        let stream = self.connect_stream().await?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY");
        }
        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);

        self.state.mark_started();
        debug!(host = %self.host, port = self.port, "tcp transport started");
        Ok(())
    }

    async fn send(&self, payload: &[u8]) -> RpcResult<()> {
        self.state.check_open("send")?;

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
            debug!("peer closed connection");
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
                warn!(error = %e, "error shutting down tcp writer");
            }
        }
        self.reader.lock().await.take();
        debug!(host = %self.host, port = self.port, "tcp transport closed");
        Ok(())
    }

    fn close_now(&self) {
        if !self.state.transition_closed() {
            return;
        }
        if let Ok(mut guard) = self.writer.try_lock() {
            guard.take();
        }
        if let Ok(mut guard) = self.reader.try_lock() {
            guard.take();
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close_now();
    }
}
