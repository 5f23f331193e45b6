//! Unix socket client for the local NSM.
//!
//! Establishes the connection once at startup and implements
//! [`BrokerClient`] on top of length-prefixed JSON-RPC calls.
//!
//! # Thread Safety
//!
//! Calls are serialized through a tokio `Mutex` around the stream. If a call
//! fails at the I/O level the stream is dropped and the next call reconnects.

use super::protocol::{method, recv, send, DiscoveryResponse, RpcRequest, RpcResponse};
use crate::broker::{BrokerClient, BrokerError};
use crate::config::ClientConfig;
use crate::models::{AdmissionRequest, AdmissionResult, ServiceDescriptor};
use crate::{NsmError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Broker client talking to the local NSM over its client socket.
#[derive(Debug)]
pub struct IpcBrokerClient {
    socket_path: PathBuf,
    stream: Mutex<Option<UnixStream>>,
    next_id: AtomicU64,
}

impl IpcBrokerClient {
    /// Validate the socket path and connect to it.
    ///
    /// Fails with [`NsmError::Transport`] if the socket does not exist or
    /// does not accept a connection within the configured timeout.
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();

        if let Err(e) = tokio::fs::metadata(&socket_path).await {
            return Err(NsmError::Transport {
                path: socket_path,
                message: format!("failure to access nsm socket: {}", e),
                source: Some(e),
            });
        }

        let stream = match open_stream(&socket_path).await {
            Ok(stream) => stream,
            Err(e) => {
                return Err(NsmError::Transport {
                    path: socket_path,
                    message: e.to_string(),
                    source: Some(e),
                })
            }
        };

        info!(
            "nsm client: connection to nsm server on socket: {} succeeded.",
            socket_path.display()
        );

        Ok(Self {
            socket_path,
            stream: Mutex::new(Some(stream)),
            next_id: AtomicU64::new(1),
        })
    }

    /// Path of the socket this client talks to.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Call a JSON-RPC method on the local NSM.
    ///
    /// Broker-side failures keep their status code; I/O failures are reported
    /// as `UNAVAILABLE` and decoding failures as `INTERNAL`. A reply whose id
    /// does not match the call is rejected and the connection is dropped.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, BrokerError> {
        let request = RpcRequest::new(method, params, self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut guard = self.stream.lock().await;
        // The stream stays out of the slot until a reply has been read, so a
        // call dropped mid-exchange leaves nothing behind to reuse.
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => {
                debug!("Reconnecting to NSM socket {}", self.socket_path.display());
                open_stream(&self.socket_path)
                    .await
                    .map_err(|e| BrokerError::unavailable(format!("failed to connect: {}", e)))?
            }
        };

        let response = exchange(&mut stream, &request).await.map_err(|e| match e {
            NsmError::Json { message, .. } => {
                BrokerError::internal(format!("failed to parse NSM response: {}", message))
            }
            other => BrokerError::unavailable(other.to_string()),
        })?;
        if response.id != Some(request.id) {
            return Err(BrokerError::internal(format!(
                "NSM answered request {} with id {:?}",
                request.id, response.id
            )));
        }
        *guard = Some(stream);
        drop(guard);

        response.into_result()
    }
}

#[async_trait::async_trait]
impl BrokerClient for IpcBrokerClient {
    async fn discover(&self) -> std::result::Result<Vec<ServiceDescriptor>, BrokerError> {
        let value = self.call(method::DISCOVER, serde_json::json!({})).await?;
        let response: DiscoveryResponse = serde_json::from_value(value)
            .map_err(|e| BrokerError::internal(format!("invalid discovery response: {}", e)))?;
        Ok(response.network_services)
    }

    async fn request_connection(
        &self,
        request: &AdmissionRequest,
    ) -> std::result::Result<AdmissionResult, BrokerError> {
        let params = serde_json::to_value(request)
            .map_err(|e| BrokerError::internal(format!("failed to encode request: {}", e)))?;
        let value = self.call(method::REQUEST_CONNECTION, params).await?;
        serde_json::from_value(value)
            .map_err(|e| BrokerError::internal(format!("invalid connection response: {}", e)))
    }
}

async fn open_stream(path: &Path) -> std::io::Result<UnixStream> {
    tokio::time::timeout(ClientConfig::IPC_CONNECT_TIMEOUT, UnixStream::connect(path))
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!(
                    "connect timed out after {:?}",
                    ClientConfig::IPC_CONNECT_TIMEOUT
                ),
            )
        })?
}

async fn exchange(stream: &mut UnixStream, request: &RpcRequest) -> Result<RpcResponse> {
    let (mut reader, mut writer) = stream.split();
    send(&mut writer, request).await?;
    recv(&mut reader).await?.ok_or_else(|| NsmError::Protocol {
        message: "NSM closed the connection".to_string(),
    })
}
