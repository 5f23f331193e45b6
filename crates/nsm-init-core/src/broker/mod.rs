//! Broker-facing side of the init protocol.
//!
//! - [`BrokerClient`]: the two remote calls exposed by the local NSM
//! - [`classify`]: maps one admission attempt to success, permanent or transient
//! - [`DiscoveryWaiter`]: retries discovery until the deadline
//! - [`ConnectionRequester`]: retries admission for one service until a terminal state

mod classify;
mod connect;
mod discovery;

pub use classify::{classify, AdmissionClass};
pub use connect::{AdmissionState, ConnectionRequester};
pub use discovery::DiscoveryWaiter;

use crate::models::{AdmissionRequest, AdmissionResult, ServiceDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Status codes carried by broker errors.
///
/// Numeric values follow the gRPC status code space used by NSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum StatusCode {
    /// The broker will never accept this request.
    Aborted,
    /// The requested network service does not exist.
    NotFound,
    /// A request with the same ID is still being programmed.
    AlreadyExists,
    /// Any other code, kept verbatim for diagnostics.
    Other(i32),
}

impl StatusCode {
    pub const DEADLINE_EXCEEDED: i32 = 4;
    pub const NOT_FOUND: i32 = 5;
    pub const ALREADY_EXISTS: i32 = 6;
    pub const ABORTED: i32 = 10;
    pub const INTERNAL: i32 = 13;
    pub const UNAVAILABLE: i32 = 14;

    pub fn as_i32(self) -> i32 {
        match self {
            StatusCode::Aborted => Self::ABORTED,
            StatusCode::NotFound => Self::NOT_FOUND,
            StatusCode::AlreadyExists => Self::ALREADY_EXISTS,
            StatusCode::Other(code) => code,
        }
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        match code {
            Self::ABORTED => StatusCode::Aborted,
            Self::NOT_FOUND => StatusCode::NotFound,
            Self::ALREADY_EXISTS => StatusCode::AlreadyExists,
            other => StatusCode::Other(other),
        }
    }
}

impl From<StatusCode> for i32 {
    fn from(code: StatusCode) -> Self {
        code.as_i32()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Aborted => write!(f, "Aborted"),
            StatusCode::NotFound => write!(f, "NotFound"),
            StatusCode::AlreadyExists => write!(f, "AlreadyExists"),
            StatusCode::Other(code) => write!(f, "code {}", code),
        }
    }
}

/// A failed broker call, classified by status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct BrokerError {
    pub code: StatusCode,
    pub message: String,
}

impl BrokerError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The broker could not be reached for this call.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Other(StatusCode::UNAVAILABLE), message)
    }

    /// The call was still unanswered when the wait loop's deadline passed.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Other(StatusCode::DEADLINE_EXCEEDED), message)
    }

    /// The broker answered with something this client cannot decode.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Other(StatusCode::INTERNAL), message)
    }
}

/// The two calls the local NSM exposes to workload clients.
///
/// Implementations must be safe to call repeatedly; the retry loops in this
/// module issue every call sequentially and never concurrently.
#[async_trait::async_trait]
pub trait BrokerClient: Send + Sync {
    /// List the network services known to the local NSM.
    async fn discover(&self) -> Result<Vec<ServiceDescriptor>, BrokerError>;

    /// Ask the local NSM to admit a connection to one network service.
    async fn request_connection(
        &self,
        request: &AdmissionRequest,
    ) -> Result<AdmissionResult, BrokerError>;
}
