//! # Transport layer
//!
//! Duplex byte-message channels with an explicit lifecycle, used by the
//! endpoint to exchange serialized JSON-RPC messages with one peer.
//!
//! The [`Transport`] trait is the contract: `start` brings the channel up
//! (server adapters accept exactly one connection inside it), `send` and
//! `receive` move whole byte payloads, `close` tears the channel down
//! cooperatively and [`Transport::close_now`] is the synchronous
//! best-effort variant safe to call from `Drop`.
//!
//! Two families of adapters exist:
//!
//! - *Unframed* ([`PipeTransport`], [`TcpTransport`], [`StdioTransport`]):
//!   `receive` yields whatever chunk the stream produced. Message
//!   boundaries are the caller's problem. Suitable for tests and
//!   line-delimited channels.
//! - *Framed* ([`Framed`]): wraps any unframed transport with LSP-style
//!   `Content-Length` framing via [`MessageFramer`], so `receive` yields
//!   exactly one complete message payload.

pub mod framed;
pub mod framer;
pub mod pipe;
pub mod stdio;
pub mod tcp;
pub mod transport;

pub use framed::{Framed, FramedPipeTransport, FramedTcpTransport};
pub use framer::{DeframeOutcome, MessageFramer};
pub use pipe::PipeTransport;
pub use stdio::StdioTransport;
pub use tcp::TcpTransport;
pub use transport::Transport;
