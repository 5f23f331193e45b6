//! Local IPC with the NSM client socket.
//!
//! Uses length-prefixed JSON-RPC 2.0 over a Unix domain socket.
//!
//! - **Protocol**: message framing, JSON-RPC envelopes and status code mapping
//! - **Client**: [`IpcBrokerClient`], the production [`BrokerClient`](crate::broker::BrokerClient)

pub mod client;
pub mod protocol;

pub use client::IpcBrokerClient;
pub use protocol::{RpcRequest, RpcResponse};
