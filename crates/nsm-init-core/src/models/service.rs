//! Network service descriptors.

use serde::{Deserialize, Serialize};

/// Name and namespace of a mesh object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl Metadata {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl std::fmt::Display for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One interface a channel offers or a client requests.
///
/// Type and preference values are defined by the broker and passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(rename = "type", default)]
    pub interface_type: String,
    #[serde(default)]
    pub preference: String,
}

impl Interface {
    pub fn new(interface_type: impl Into<String>, preference: impl Into<String>) -> Self {
        Self {
            interface_type: interface_type.into(),
            preference: preference.into(),
        }
    }
}

/// A data-plane channel of a network service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub metadata: Metadata,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
}

/// A network service as advertised by the local NSM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub metadata: Metadata,
    #[serde(default)]
    pub channels: Vec<ChannelDescriptor>,
}

impl ServiceDescriptor {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// A network service the workload wants to be connected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredService {
    pub name: String,
    #[serde(rename = "serviceInterface", default)]
    pub interfaces: Vec<Interface>,
}
