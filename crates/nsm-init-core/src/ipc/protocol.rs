//! Wire contract of the local NSM client socket.
//!
//! Every message is one JSON-RPC 2.0 object behind a big-endian `u32` length:
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! Error objects carry broker status codes in `code`, so a failed call maps
//! straight onto [`BrokerError`].

use crate::broker::BrokerError;
use crate::config::ClientConfig;
use crate::models::ServiceDescriptor;
use crate::{NsmError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Method names exposed by the local NSM.
pub mod method {
    pub const DISCOVER: &str = "discover";
    pub const REQUEST_CONNECTION: &str = "request_connection";
}

const JSONRPC_VERSION: &str = "2.0";

/// A call to the local NSM. Ids are assigned by the client, one per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: &str, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id,
        }
    }
}

/// The NSM answer to one [`RpcRequest`].
///
/// `id` is `None` only when the broker could not read the request at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<u64>,
}

impl RpcResponse {
    /// Answer `request` with a result.
    pub fn ok(request: &RpcRequest, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id: Some(request.id),
        }
    }

    /// Answer `request` with a broker status code.
    pub fn failed(request: &RpcRequest, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id: Some(request.id),
        }
    }

    /// Split into the call result or the broker error it carries.
    pub fn into_result(self) -> std::result::Result<serde_json::Value, BrokerError> {
        match (self.error, self.result) {
            (Some(err), _) => Err(err.into()),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(BrokerError::internal("NSM response missing result")),
        }
    }
}

/// JSON-RPC error object; `code` is a broker status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl From<RpcError> for BrokerError {
    fn from(err: RpcError) -> Self {
        BrokerError::new(err.code.into(), err.message)
    }
}

/// Result payload of the `discover` method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    #[serde(default)]
    pub network_services: Vec<ServiceDescriptor>,
}

/// Send one message.
pub async fn send<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > ClientConfig::MAX_IPC_MESSAGE_SIZE {
        return Err(NsmError::Protocol {
            message: format!("outgoing message of {} bytes is too large", body.len()),
        });
    }

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Receive one message. `None` means the peer closed the socket between messages.
pub async fn recv<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > ClientConfig::MAX_IPC_MESSAGE_SIZE {
        return Err(NsmError::Protocol {
            message: format!(
                "incoming message of {} bytes exceeds the {} byte limit",
                len,
                ClientConfig::MAX_IPC_MESSAGE_SIZE
            ),
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}
