use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

/// Broad category of a [`NetworkError`], so callers can decide whether to retry, prompt or ignore
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Duplicate,
    InvalidState,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("network node `{key}` does not exist")]
    NodeNotFound { key: String },
    #[error("network node `{node}` has no interface named `{interface}`")]
    InterfaceNotFound { node: Arc<str>, interface: String },
    #[error("a network node named `{name}` already exists")]
    DuplicateName { name: String },
    #[error("a network node with address `{ip}` already exists")]
    DuplicateIp { ip: IpAddr },
    #[error("network node `{node}` already has an interface named `{interface}`")]
    DuplicateInterface { node: Arc<str>, interface: String },
    #[error("network node `{node}` is not a host")]
    NotAHost { node: Arc<str> },
    #[error("network node `{node}` is not a router")]
    NotARouter { node: Arc<str> },
    #[error("host `{node}` has no application attached")]
    NoApplication { node: Arc<str> },
    #[error("the application of host `{node}` has exhausted its quota")]
    QuotaExhausted { node: Arc<str> },
    #[error("host `{node}` attempted to send a packet to itself")]
    SelfAddressed { node: Arc<str> },
    #[error("network node `{node}` has no route towards `{destination}`")]
    NoRoute { node: Arc<str>, destination: IpAddr },
    #[error("no packet available at interface `{interface}` of node `{node}`")]
    NoPacketAvailable { node: Arc<str>, interface: Arc<str> },
    #[error("interface `{interface}` of node `{node}` is already connected")]
    InterfaceInUse { node: Arc<str>, interface: Arc<str> },
    #[error("interface `{interface}` of node `{node}` is not connected")]
    InterfaceNotConnected { node: Arc<str>, interface: Arc<str> },
    #[error("network node `{node}` cannot be connected to itself")]
    SelfConnection { node: Arc<str> },
}

impl NetworkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::NodeNotFound { .. } | NetworkError::InterfaceNotFound { .. } => {
                ErrorKind::NotFound
            }
            NetworkError::DuplicateName { .. }
            | NetworkError::DuplicateIp { .. }
            | NetworkError::DuplicateInterface { .. } => ErrorKind::Duplicate,
            NetworkError::NotAHost { .. }
            | NetworkError::NotARouter { .. }
            | NetworkError::NoApplication { .. }
            | NetworkError::QuotaExhausted { .. }
            | NetworkError::SelfAddressed { .. }
            | NetworkError::NoRoute { .. }
            | NetworkError::NoPacketAvailable { .. }
            | NetworkError::InterfaceInUse { .. }
            | NetworkError::InterfaceNotConnected { .. }
            | NetworkError::SelfConnection { .. } => ErrorKind::InvalidState,
        }
    }
}
