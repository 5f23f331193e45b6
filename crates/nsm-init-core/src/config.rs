//! Centralized configuration for the NSM init client.
//!
//! `ClientConfig` holds the protocol constants. `InitConfig` is the immutable
//! per-process configuration built once at startup and passed by reference
//! to the initializer.

use crate::models::Metadata;
use crate::retry::RetryPolicy;
use crate::{NsmError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Protocol and transport constants.
pub struct ClientConfig;

impl ClientConfig {
    // Wait loops
    pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);
    pub const CONNECTION_RETRY_INTERVAL: Duration = Duration::from_secs(2);

    // Local NSM socket
    pub const SOCKET_BASE_DIR: &'static str = "/var/lib/networkservicemesh";
    pub const SERVER_SOCK: &'static str = "nsm.ligato.io.sock";
    pub const IPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MAX_IPC_MESSAGE_SIZE: usize = 4 * 1024 * 1024; // 4MB

    // Workload configuration resource
    pub const NETWORK_SERVICE_KEY: &'static str = "networkService";

    /// Default location of the local NSM client socket.
    pub fn default_socket_path() -> PathBuf {
        Path::new(Self::SOCKET_BASE_DIR).join(Self::SERVER_SOCK)
    }
}

/// Immutable configuration of one init run.
#[derive(Debug, Clone)]
pub struct InitConfig {
    /// Local NSM client socket.
    pub socket_path: PathBuf,
    /// Mounted configuration resource holding the desired services.
    pub services_path: Option<PathBuf>,
    /// Identity of the requesting workload.
    pub requester: Metadata,
    /// Idempotency token sent with every admission request.
    pub request_id: String,
    /// Timeout and retry interval for both wait loops.
    pub policy: RetryPolicy,
}

impl InitConfig {
    pub fn new(requester: Metadata, request_id: impl Into<String>) -> Self {
        Self {
            socket_path: ClientConfig::default_socket_path(),
            services_path: None,
            requester,
            request_id: request_id.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    pub fn with_services_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.services_path = Some(path.into());
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Check that the values needed to talk to the broker are present.
    pub fn validate(&self) -> Result<()> {
        if self.requester.namespace.is_empty() {
            return Err(NsmError::Config {
                message: "cannot detect namespace, make sure INIT_NAMESPACE is set".to_string(),
            });
        }
        if self.requester.name.is_empty() {
            return Err(NsmError::Config {
                message: "cannot detect workload name, make sure HOSTNAME is set".to_string(),
            });
        }
        if self.request_id.is_empty() {
            return Err(NsmError::Validation {
                field: "request_id".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        self.policy.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_socket_path() {
        assert_eq!(
            ClientConfig::default_socket_path(),
            PathBuf::from("/var/lib/networkservicemesh/nsm.ligato.io.sock")
        );
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(ClientConfig::CONNECTION_RETRY_INTERVAL < ClientConfig::CONNECTION_TIMEOUT);
        assert!(ClientConfig::IPC_CONNECT_TIMEOUT > Duration::ZERO);
    }

    #[test]
    fn test_validate_requires_namespace() {
        let config = InitConfig::new(Metadata::new("pod-a", ""), "uid-1");
        assert!(matches!(config.validate(), Err(NsmError::Config { .. })));
    }

    #[test]
    fn test_validate_requires_request_id() {
        let config = InitConfig::new(Metadata::new("pod-a", "default"), "");
        assert!(matches!(config.validate(), Err(NsmError::Validation { .. })));
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let config = InitConfig::new(Metadata::new("pod-a", "default"), "uid-1")
            .with_socket_path("/tmp/nsm.sock")
            .with_services_path("/etc/nsm")
            .with_policy(RetryPolicy::new(Duration::from_secs(6), Duration::from_secs(2)));
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_path, PathBuf::from("/tmp/nsm.sock"));
    }
}
