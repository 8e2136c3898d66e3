//! Network module: probe targets and the transport primitives used to test them

pub mod icmp;
pub mod socket;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport used to test a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Icmp => "icmp",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    /// Whether the protocol addresses a port
    pub fn uses_port(&self) -> bool {
        !matches!(self, Protocol::Icmp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target category. Identities are unique within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Host,
    Service,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Host => "host",
            TargetKind::Service => "service",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host or (host, port) service configured for probing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Identity within the target's category
    pub name: String,

    /// IP address or hostname
    pub address: String,

    /// Port for service targets
    pub port: Option<u16>,

    pub protocol: Protocol,

    pub enabled: bool,
}

impl Target {
    /// Create an ICMP host target
    pub fn host(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: None,
            protocol: Protocol::Icmp,
            enabled: true,
        }
    }

    /// Create a TCP or UDP service target
    pub fn service(
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        protocol: Protocol,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: Some(port),
            protocol,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn kind(&self) -> TargetKind {
        match self.protocol {
            Protocol::Icmp => TargetKind::Host,
            Protocol::Tcp | Protocol::Udp => TargetKind::Service,
        }
    }

    /// `address` for hosts, `address:port` for services
    pub fn endpoint(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.address, port),
            None => self.address.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}/{})", self.kind(), self.name, self.endpoint(), self.protocol)
    }
}
