//! NSM init core - client side of the NSM connection-establishment protocol.
//!
//! On startup a workload asks the local NSM which network services exist,
//! then requests admission for each service it needs. Both phases poll the
//! broker on a fixed tick until a deadline, and admission failures are
//! classified by status code into retryable and final ones.
//!
//! # Example
//!
//! ```rust,ignore
//! use nsm_init_core::{
//!     current_netns, load_desired_services, InitConfig, Initializer, IpcBrokerClient, Metadata,
//!     TokioClock,
//! };
//!
//! #[tokio::main]
//! async fn main() -> nsm_init_core::Result<()> {
//!     let config = InitConfig::new(Metadata::new("my-pod", "default"), "pod-uid")
//!         .with_services_path("/etc/nsm");
//!     let desired = load_desired_services("/etc/nsm").await?;
//!     let broker = IpcBrokerClient::connect(&config.socket_path).await?;
//!
//!     let outcome = Initializer::new(&config, &broker, &TokioClock)
//!         .run(&desired, &current_netns()?)
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod clock;
pub mod config;
pub mod desired;
pub mod error;
pub mod identity;
pub mod init;
pub mod ipc;
pub mod models;
pub mod retry;

// Re-export commonly used types
pub use broker::{
    classify, AdmissionClass, AdmissionState, BrokerClient, BrokerError, ConnectionRequester,
    DiscoveryWaiter, StatusCode,
};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{ClientConfig, InitConfig};
pub use desired::{load_desired_services, parse_desired_services};
pub use error::{NsmError, Result};
pub use identity::current_netns;
pub use init::{InitOutcome, Initializer, ServiceConnection};
pub use ipc::IpcBrokerClient;
pub use models::{
    AdmissionRequest, AdmissionResult, ChannelDescriptor, ConnectionParameters, DesiredService,
    Interface, Metadata, ServiceDescriptor,
};
pub use retry::{RetryContext, RetryPolicy};
