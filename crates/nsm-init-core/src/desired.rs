//! Desired network services of the workload.
//!
//! The list lives under the `networkService` key of a configuration
//! resource. When the resource is mounted as a directory each key is a file,
//! so both forms are accepted:
//!
//! - a directory containing a `networkService` file
//! - a file whose whole content is the value of that key
//!
//! The value is YAML (JSON is accepted as a subset):
//!
//! ```yaml
//! - name: gold-network
//!   serviceInterface:
//!     - type: KERNEL_INTERFACE
//!       preference: DEFAULT
//! ```

use crate::config::ClientConfig;
use crate::models::DesiredService;
use crate::{NsmError, Result};
use std::path::Path;
use tracing::{debug, error};

/// Load the desired services from a mounted configuration resource.
pub async fn load_desired_services(path: impl AsRef<Path>) -> Result<Vec<DesiredService>> {
    let path = path.as_ref();
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| NsmError::io_with_path(e, path))?;

    let file = if metadata.is_dir() {
        let key = path.join(ClientConfig::NETWORK_SERVICE_KEY);
        if !tokio::fs::try_exists(&key).await.unwrap_or(false) {
            return Err(NsmError::Config {
                message: format!(
                    "missing required key '{}:' in {}",
                    ClientConfig::NETWORK_SERVICE_KEY,
                    path.display()
                ),
            });
        }
        key
    } else {
        path.to_path_buf()
    };

    let raw = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| NsmError::io_with_path(e, &file))?;
    debug!("Read desired services from {}", file.display());

    parse_desired_services(&raw).inspect_err(|e| {
        error!("decoding {} failed with error: {}", file.display(), e);
    })
}

/// Parse the `networkService` value.
///
/// An empty or whitespace-only value is an empty list.
pub fn parse_desired_services(raw: &str) -> Result<Vec<DesiredService>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let services: Vec<DesiredService> = serde_yaml::from_str(raw)?;

    for svc in &services {
        if svc.name.trim().is_empty() {
            return Err(NsmError::Validation {
                field: "networkService.name".to_string(),
                message: "network service name must not be empty".to_string(),
            });
        }
    }

    Ok(services)
}
