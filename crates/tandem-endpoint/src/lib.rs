//! # Bidirectional JSON-RPC 2.0 endpoint
//!
//! An [`RpcEndpoint`] is a symmetric JSON-RPC 2.0 peer over one duplex
//! transport: it issues method calls and notifications while concurrently
//! serving the peer's, multiplexed by a single message pump. The
//! [`Dispatcher`] routes inbound traffic to registered handlers
//! (including concurrent batch execution); the pending-request table
//! pairs inbound responses with outstanding outbound calls.
//!
//! [`RpcClient`] and [`RpcServer`] are thin facades for the two common
//! asymmetric setups; both expose the full endpoint underneath, so a
//! "client" can still serve peer-initiated notifications and a "server"
//! can call back into its peer.

pub mod client;
pub mod dispatcher;
pub mod endpoint;
pub mod id;
pub mod pending;
pub mod prelude;
pub mod server;
pub mod shutdown;

pub use client::{ClientConfig, RpcClient};
pub use dispatcher::{Dispatcher, MethodHandler, NotificationHandler};
pub use endpoint::RpcEndpoint;
pub use id::{IdGenerator, SequentialIdGenerator};
pub use pending::{PendingRequest, ResultSlot};
pub use server::RpcServer;
pub use shutdown::ShutdownToken;

pub use tandem_json_rpc::{
    Request, RequestId, Response, RpcError, RpcErrorCode, RpcResult,
};
pub use tandem_transport::Transport;
