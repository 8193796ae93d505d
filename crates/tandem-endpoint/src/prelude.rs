//! Convenience re-exports for the common endpoint workflow.
//!
//! ```
//! use tandem_endpoint::prelude::*;
//! ```

pub use crate::client::{ClientConfig, RpcClient};
pub use crate::dispatcher::Dispatcher;
pub use crate::endpoint::RpcEndpoint;
pub use crate::server::RpcServer;
pub use crate::shutdown::ShutdownToken;

pub use tandem_json_rpc::{Request, RequestId, Response, RpcError, RpcErrorCode, RpcResult};
pub use tandem_transport::{
    Framed, FramedPipeTransport, FramedTcpTransport, PipeTransport, StdioTransport, TcpTransport,
    Transport,
};
