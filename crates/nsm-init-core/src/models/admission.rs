//! Admission request and result.

use super::{DesiredService, Interface, Metadata};
use serde::{Deserialize, Serialize};

/// A connection request for one network service.
///
/// Built once per desired service and sent unchanged on every retry, so the
/// broker can deduplicate attempts by `request_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    pub request_id: String,
    pub metadata: Metadata,
    pub network_service_name: String,
    pub linux_namespace: String,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
}

impl AdmissionRequest {
    /// Build the request for `service` on behalf of `requester`.
    pub fn for_service(
        request_id: impl Into<String>,
        requester: Metadata,
        linux_namespace: impl Into<String>,
        service: &DesiredService,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            metadata: requester,
            network_service_name: service.name.clone(),
            linux_namespace: linux_namespace.into(),
            interfaces: service.interfaces.clone(),
        }
    }
}

/// Opaque connection parameters handed back by the broker on admission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionParameters(pub serde_json::Value);

impl std::fmt::Display for ConnectionParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The broker's answer to one admission attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionResult {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_parameters: Option<ConnectionParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_error: Option<String>,
}

impl AdmissionResult {
    pub fn accepted(parameters: ConnectionParameters) -> Self {
        Self {
            accepted: true,
            connection_parameters: Some(parameters),
            admission_error: None,
        }
    }

    pub fn declined(admission_error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            connection_parameters: None,
            admission_error: Some(admission_error.into()),
        }
    }
}
