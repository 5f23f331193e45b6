//! Data types exchanged with the local NSM and read from workload configuration.

mod admission;
mod service;

pub use admission::{AdmissionRequest, AdmissionResult, ConnectionParameters};
pub use service::{ChannelDescriptor, DesiredService, Interface, Metadata, ServiceDescriptor};
