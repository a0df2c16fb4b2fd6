//! Process-backed language server sessions.
//!
//! [`ProcessLanguageServer`] spawns `notedown serve` with the workspace root
//! as its working directory and speaks JSON-RPC 2.0 over the child's stdio.
//! Writes happen on the caller's thread; a reader thread per process parses
//! incoming frames, completes the matching [`PendingReply`](crate::PendingReply)
//! and queues server notifications until the host drains them.
//!
//! - [`LspServerConfig`]: command, arguments and working directory
//! - [`AdapterError`] and [`TransportError`]: adapter failures
//! - [`JsonRpcRequest`], [`JsonRpcMessage`]: JSON-RPC 2.0 encoding/decoding
//! - [`FramedReader`], [`FramedWriter`]: `Content-Length` framing
//! - [`ProcessServerFactory`]: plugs the adapter into [`LspHost`](crate::LspHost)

mod config;
mod error;
mod factory;
mod inbox;
mod jsonrpc;
mod lifecycle;
mod process;
mod state;
mod transport;

pub use config::LspServerConfig;
pub use error::{AdapterError, TransportError};
pub use factory::ProcessServerFactory;
pub use jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResult, ServerRequest,
};
pub use process::ProcessLanguageServer;
pub use state::ProcessState;
pub use transport::{FramedReader, FramedWriter};

/// Log target for adapter operations.
pub(crate) const ADAPTER_TARGET: &str = "notedown_lsp_host::adapter";
