use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tandem_json_rpc::{RpcError, RpcResult};

/// Abstract duplex byte-message channel bound to exactly one peer.
///
/// State progresses monotonically `initial → started → closed`; operations
/// issued in the wrong state fail with a `TransportError`. Implementations
/// must serialize concurrent `send`s so that two payloads never interleave
/// on the wire, and must retry partial writes internally.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bring the channel up. Rejects a second call with
    /// `TransportError("transport already started")`. On success the
    /// transport is connected and ready for `send`/`receive`; server
    /// adapters block here until a peer connects.
    async fn start(&self) -> RpcResult<()>;

    /// Write one payload completely.
    async fn send(&self, payload: &[u8]) -> RpcResult<()>;

    /// Yield the next chunk (unframed adapters) or next complete message
    /// (framed adapters). Returns `TransportError("connection closed")`
    /// once the peer has closed and the buffer is drained.
    async fn receive(&self) -> RpcResult<Vec<u8>>;

    /// Cooperative teardown. Idempotent after the first success.
    async fn close(&self) -> RpcResult<()>;

    /// Synchronous best-effort teardown, safe to call from `Drop`.
    fn close_now(&self);
}

/// The `(is_started, is_connected, is_closed)` progression shared by the
/// concrete adapters, with the error wording of the transport contract.
#[derive(Debug, Default)]
pub(crate) struct TransportState {
    started: AtomicBool,
    connected: AtomicBool,
    closed: AtomicBool,
}

impl TransportState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Validate that `start` may proceed from the current state.
    pub(crate) fn check_can_start(&self) -> RpcResult<()> {
        if self.is_closed() {
            return Err(RpcError::transport_error("cannot start a closed transport"));
        }
        if self.is_started() {
            return Err(RpcError::transport_error("transport already started"));
        }
        Ok(())
    }

    /// Record a successful `start`.
    pub(crate) fn mark_started(&self) {
        self.started.store(true, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Transition to closed. Returns `true` if this call performed the
    /// transition, `false` if the transport was already closed.
    pub(crate) fn transition_closed(&self) -> bool {
        self.connected.store(false, Ordering::SeqCst);
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Validate that `send`/`receive` may proceed.
    pub(crate) fn check_open(&self, operation: &str) -> RpcResult<()> {
        if self.is_closed() {
            return Err(RpcError::transport_error(format!(
                "{operation} on closed transport"
            )));
        }
        if !self.is_started() {
            return Err(RpcError::transport_error(format!(
                "{operation} before transport start"
            )));
        }
        Ok(())
    }
}
