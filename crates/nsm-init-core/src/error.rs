//! Error types for the NSM init client.
//!
//! Terminal states of the discovery and admission loops are surfaced as
//! dedicated variants carrying enough context (service name, last status
//! code, broker diagnostic) for a human-readable report.

use crate::broker::{BrokerError, StatusCode};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the NSM init client.
#[derive(Debug, Error)]
pub enum NsmError {
    // Broker errors
    #[error("Failure to communicate with NSM socket {path:?}: {message}")]
    Transport {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error(
        "Discovery request did not succeed within {timeout:?} ({attempts} attempts), last known error: {}",
        describe_last(.last_error)
    )]
    DiscoveryTimeout {
        timeout: Duration,
        attempts: u32,
        last_error: Option<BrokerError>,
    },

    #[error("Request Connection for Network Service {service} has failed with {code}: {message}{}", describe_admission(.admission_error))]
    AdmissionRejected {
        service: String,
        code: StatusCode,
        message: String,
        admission_error: Option<String>,
    },

    #[error(
        "Request Connection for Network Service {service} timed out after {timeout:?} ({attempts} attempts), last known error: {}{}",
        describe_last(.last_error),
        describe_admission(.admission_error)
    )]
    AdmissionTimeout {
        service: String,
        timeout: Duration,
        attempts: u32,
        last_error: Option<BrokerError>,
        admission_error: Option<String>,
    },

    #[error("Malformed broker message: {message}")]
    Protocol { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("YAML error: {message}")]
    Yaml {
        message: String,
        #[source]
        source: Option<serde_yaml::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for NSM init operations.
pub type Result<T> = std::result::Result<T, NsmError>;

fn describe_last(last: &Option<BrokerError>) -> String {
    match last {
        Some(err) => err.to_string(),
        None => "none".to_string(),
    }
}

fn describe_admission(admission_error: &Option<String>) -> String {
    match admission_error {
        Some(diag) if !diag.is_empty() => format!(" (admission error: {})", diag),
        _ => String::new(),
    }
}

impl From<std::io::Error> for NsmError {
    fn from(err: std::io::Error) -> Self {
        NsmError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for NsmError {
    fn from(err: serde_json::Error) -> Self {
        NsmError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_yaml::Error> for NsmError {
    fn from(err: serde_yaml::Error) -> Self {
        NsmError::Yaml {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl NsmError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        NsmError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Name of the network service this error belongs to, if it is a
    /// per-service admission failure.
    pub fn service(&self) -> Option<&str> {
        match self {
            NsmError::AdmissionRejected { service, .. }
            | NsmError::AdmissionTimeout { service, .. } => Some(service),
            _ => None,
        }
    }

    /// Whether the broker could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, NsmError::Transport { .. })
    }
}
