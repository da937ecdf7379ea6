use crate::network::application::ApplicationKind;
use std::net::IpAddr;

/// Declarative description of a topology, see [`crate::network::Network::from_spec`]
#[derive(Clone, Debug, Default)]
pub struct NetworkSpec {
    pub nodes: Vec<NetworkNodeSpec>,
    pub links: Vec<NetworkLinkSpec>,
}

#[derive(Clone, Debug)]
pub struct NetworkNodeSpec {
    pub name: String,
    pub ip: IpAddr,
    pub role: NodeRole,
    pub send_rate: u64,
    /// Only meaningful for routers
    pub buffer_size: i64,
    pub interfaces: Vec<String>,
    /// Only meaningful for hosts
    pub application: Option<ApplicationSpec>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeRole {
    Host,
    Router,
}

#[derive(Clone, Debug)]
pub struct ApplicationSpec {
    pub name: String,
    pub amount: u64,
    pub send_rate: u64,
    pub kind: ApplicationKind,
}

#[derive(Clone, Debug)]
pub struct NetworkLinkSpec {
    pub a: LinkEndpointSpec,
    pub b: LinkEndpointSpec,
    pub speed: i64,
    pub metric: i64,
}

#[derive(Clone, Debug)]
pub struct LinkEndpointSpec {
    pub node: String,
    pub interface: String,
}
